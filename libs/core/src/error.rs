use std::fmt;

/// Hard failures surfaced to callers of the widget surface.
#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("vendor entry point is not loaded (command `{command}`)")]
    VendorNotLoaded { command: String },
    #[error("invalid widget configuration: {0}")]
    Config(String),
    #[error("widget configuration is not valid json")]
    Json(#[from] serde_json::Error),
    #[error("no tokio runtime is running; cannot {0}")]
    NoRuntime(&'static str),
}

/// Soft guard outcomes. These are logged and counted, never returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotInitialized,
    NotBooted { operation: &'static str },
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::NotInitialized => "not_initialized",
            Rejection::NotBooted { .. } => "not_booted",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotInitialized => f.write_str(
                "widget is not initialized: no vendor instance is loaded and `should_initialize` is false",
            ),
            Rejection::NotBooted { operation } => write!(
                f,
                "`{operation}` was called before the widget booted; call `boot` first or enable `auto_boot`"
            ),
        }
    }
}
