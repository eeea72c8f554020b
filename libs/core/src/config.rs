use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::WidgetError;
use crate::props::WidgetProps;

pub const DEFAULT_PING_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_EXTERNAL_FALLBACK_DELAY_MS: u64 = 30_000;

/// Whether the provider runs where a rendering surface exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionContext {
    #[default]
    Client,
    Server,
}

impl ExecutionContext {
    pub fn is_server(self) -> bool {
        matches!(self, ExecutionContext::Server)
    }
}

/// Provider configuration, fixed for the lifetime of a provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub app_id: String,
    #[serde(default)]
    pub auto_boot: bool,
    #[serde(default)]
    pub auto_boot_props: Option<WidgetProps>,
    /// Defaults to `true` on the client and `false` on the server.
    #[serde(default)]
    pub should_initialize: Option<bool>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default, rename = "initializeDelay")]
    pub initialize_delay_ms: Option<u64>,
    #[serde(default)]
    pub use_external_instance: bool,
    #[serde(default = "default_true")]
    pub external_fallback_enabled: bool,
    #[serde(default = "default_fallback_delay", rename = "externalFallbackDelay")]
    pub external_fallback_delay_ms: u64,
    #[serde(default = "default_ping_interval", rename = "pingInterval")]
    pub ping_interval_ms: u64,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

fn default_fallback_delay() -> u64 {
    DEFAULT_EXTERNAL_FALLBACK_DELAY_MS
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

impl ProviderConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            auto_boot: false,
            auto_boot_props: None,
            should_initialize: None,
            api_base: None,
            initialize_delay_ms: None,
            use_external_instance: false,
            external_fallback_enabled: true,
            external_fallback_delay_ms: DEFAULT_EXTERNAL_FALLBACK_DELAY_MS,
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            unknown: BTreeMap::new(),
        }
    }

    /// Parses provider props. Unrecognised keys are reported and ignored.
    pub fn from_json(raw: &str) -> Result<Self, WidgetError> {
        let mut config: ProviderConfig = serde_json::from_str(raw)?;
        for key in std::mem::take(&mut config.unknown).keys() {
            warn!(key = %key, "ignoring unrecognised widget provider prop");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, WidgetError> {
        let app_id = env::var("WIDGET_APP_ID")
            .map_err(|_| WidgetError::Config("WIDGET_APP_ID is not set".into()))?;
        let mut config = Self::new(app_id);
        if let Some(flag) = env_flag("WIDGET_AUTO_BOOT") {
            config.auto_boot = flag;
        }
        config.should_initialize = env_flag("WIDGET_SHOULD_INITIALIZE");
        config.api_base = env::var("WIDGET_API_BASE").ok().filter(|v| !v.trim().is_empty());
        config.initialize_delay_ms = env_millis("WIDGET_INITIALIZE_DELAY_MS")?;
        if let Some(flag) = env_flag("WIDGET_USE_EXTERNAL_INSTANCE") {
            config.use_external_instance = flag;
        }
        if let Some(flag) = env_flag("WIDGET_EXTERNAL_FALLBACK") {
            config.external_fallback_enabled = flag;
        }
        if let Some(ms) = env_millis("WIDGET_EXTERNAL_FALLBACK_DELAY_MS")? {
            config.external_fallback_delay_ms = ms;
        }
        if let Some(ms) = env_millis("WIDGET_PING_INTERVAL_MS")? {
            config.ping_interval_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WidgetError> {
        if self.app_id.trim().is_empty() {
            return Err(WidgetError::Config("appId must not be empty".into()));
        }
        if self.ping_interval_ms == 0 {
            return Err(WidgetError::Config("pingInterval must be positive".into()));
        }
        Ok(())
    }

    pub fn with_auto_boot(mut self, props: Option<WidgetProps>) -> Self {
        self.auto_boot = true;
        self.auto_boot_props = props;
        self
    }

    pub fn with_should_initialize(mut self, should_initialize: bool) -> Self {
        self.should_initialize = Some(should_initialize);
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_initialize_delay(mut self, delay: Duration) -> Self {
        self.initialize_delay_ms = Some(millis(delay));
        self
    }

    /// Waits for an externally loaded instance; `fallback` is the self-initialize delay.
    pub fn with_external_instance(mut self, fallback: Option<Duration>) -> Self {
        self.use_external_instance = true;
        match fallback {
            Some(delay) => {
                self.external_fallback_enabled = true;
                self.external_fallback_delay_ms = millis(delay);
            }
            None => self.external_fallback_enabled = false,
        }
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_ms = millis(interval).max(1);
        self
    }

    pub fn should_initialize(&self, context: ExecutionContext) -> bool {
        self.should_initialize.unwrap_or(!context.is_server())
    }

    pub fn initialize_delay(&self) -> Option<Duration> {
        self.initialize_delay_ms.map(Duration::from_millis)
    }

    pub fn external_fallback_delay(&self) -> Duration {
        Duration::from_millis(self.external_fallback_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_millis(key: &str) -> Result<Option<u64>, WidgetError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| WidgetError::Config(format!("{key} must be milliseconds, got `{raw}`"))),
        Err(_) => Ok(None),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub type Callback = Arc<dyn Fn() + Send + Sync>;
pub type UnreadCountCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Hooks invoked as the vendor widget reports events.
#[derive(Clone, Default)]
pub struct ProviderCallbacks {
    pub on_boot: Option<Callback>,
    pub on_hide: Option<Callback>,
    pub on_show: Option<Callback>,
    pub on_unread_count_change: Option<UnreadCountCallback>,
    pub on_user_email_supplied: Option<Callback>,
}

impl ProviderCallbacks {
    pub fn on_boot(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_boot = Some(Arc::new(f));
        self
    }

    pub fn on_hide(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_hide = Some(Arc::new(f));
        self
    }

    pub fn on_show(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_show = Some(Arc::new(f));
        self
    }

    pub fn on_unread_count_change(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_unread_count_change = Some(Arc::new(f));
        self
    }

    pub fn on_user_email_supplied(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_user_email_supplied = Some(Arc::new(f));
        self
    }
}
