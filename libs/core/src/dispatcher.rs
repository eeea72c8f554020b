use metrics::counter;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::WidgetError;
use crate::registry::SharedRegistry;
use crate::vendor::CommandArg;

/// Forwards named commands to whatever entry point the registry currently holds.
///
/// Readiness is the caller's concern; the dispatcher only refuses when nothing
/// callable is installed.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
}

impl Dispatcher {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn dispatch(
        &self,
        command: &str,
        args: Vec<CommandArg>,
    ) -> Result<Option<Value>, WidgetError> {
        let Some(entry_point) = self.registry.entry_point() else {
            error!(command, "vendor entry point missing at dispatch time");
            return Err(WidgetError::VendorNotLoaded {
                command: command.to_string(),
            });
        };
        counter!("widget_commands_total", "command" => command.to_string()).increment(1);
        debug!(command, args = args.len(), "forwarding widget command");
        Ok(entry_point.call(command, args))
    }
}
