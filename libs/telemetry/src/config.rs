use std::env;

/// Deployment tier. Production silences non-critical widget diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Development,
    Production,
    Other(String),
}

impl Deployment {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "dev" | "development" | "local" => Deployment::Development,
            "prod" | "production" => Deployment::Production,
            other => Deployment::Other(other.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Deployment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub deployment: Deployment,
    pub json_logs: bool,
    /// Raw `RUST_LOG` directives, when set.
    pub filter: Option<String>,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| default_service_name.to_string());
        let deployment = Deployment::parse(&env::var("DEPLOYMENT_ENV").unwrap_or_default());
        let json_logs = env::var("LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(false);
        let filter = env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty());

        Self {
            service_name,
            deployment,
            json_logs,
            filter,
        }
    }

    /// Filter directives used when `RUST_LOG` is absent.
    pub fn default_directives(&self) -> String {
        if self.deployment.is_production() {
            "error".to_string()
        } else {
            "info".to_string()
        }
    }

    pub fn directives(&self) -> String {
        self.filter
            .clone()
            .unwrap_or_else(|| self.default_directives())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(deployment: &str, filter: Option<&str>) -> TelemetryConfig {
        TelemetryConfig {
            service_name: "widget".into(),
            deployment: Deployment::parse(deployment),
            json_logs: false,
            filter: filter.map(str::to_string),
        }
    }

    #[test]
    fn production_defaults_to_errors_only() {
        assert_eq!(config("production", None).directives(), "error");
        assert_eq!(config("PROD", None).directives(), "error");
    }

    #[test]
    fn development_defaults_to_info() {
        assert_eq!(config("", None).directives(), "info");
        assert_eq!(config("staging", None).directives(), "info");
    }

    #[test]
    fn explicit_filter_wins() {
        assert_eq!(
            config("production", Some("mw_core=debug")).directives(),
            "mw_core=debug"
        );
    }

    #[test]
    fn parses_deployments() {
        assert_eq!(Deployment::parse("dev"), Deployment::Development);
        assert_eq!(
            Deployment::parse("Staging"),
            Deployment::Other("staging".into())
        );
    }
}
