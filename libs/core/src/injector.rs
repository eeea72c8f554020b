//! Vendor script injection.
//!
//! Injection installs a queueing stub in the registry right away, then asks the
//! host to fetch the real script. Calls made in between are replayed once the
//! host reports the script as loaded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::registry::SharedRegistry;
use crate::vendor::{SharedEntryPoint, StubEntryPoint};

pub const WIDGET_SCRIPT_BASE: &str = "https://widget.intercom.io/widget";

pub fn widget_script_url(app_id: &str) -> String {
    format!("{WIDGET_SCRIPT_BASE}/{app_id}")
}

pub trait ScriptInjector: Send + Sync {
    fn initialize(&self, app_id: &str, delay: Option<Duration>);
}

/// Host hook that fetches and evaluates the vendor script.
pub trait ScriptLoader: Send + Sync + 'static {
    fn load(&self, request: LoadRequest);
}

/// A pending script load. The host completes it with the real entry point.
pub struct LoadRequest {
    pub src: String,
    stub: Arc<StubEntryPoint>,
    registry: SharedRegistry,
}

impl LoadRequest {
    /// Installs `real` in the registry and replays calls queued on the stub.
    pub fn complete(self, real: SharedEntryPoint) {
        self.registry.set_entry_point(real.clone());
        let replayed = self.stub.drain_into(real.as_ref());
        info!(src = %self.src, replayed, "vendor script loaded");
    }
}

/// Loader that only records the request; for hosts that load the script themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLoader;

impl ScriptLoader for LoggingLoader {
    fn load(&self, request: LoadRequest) {
        info!(src = %request.src, "vendor script requested");
    }
}

pub struct StubInjector<L> {
    registry: SharedRegistry,
    loader: Arc<L>,
}

impl<L: ScriptLoader> StubInjector<L> {
    pub fn new(registry: SharedRegistry, loader: L) -> Self {
        Self {
            registry,
            loader: Arc::new(loader),
        }
    }
}

impl<L: ScriptLoader> ScriptInjector for StubInjector<L> {
    fn initialize(&self, app_id: &str, delay: Option<Duration>) {
        if self.registry.is_loaded() {
            debug!(app_id, "vendor entry point already present; skipping injection");
            return;
        }

        let stub = Arc::new(StubEntryPoint::new());
        self.registry.set_entry_point(stub.clone());
        let request = LoadRequest {
            src: widget_script_url(app_id),
            stub,
            registry: self.registry.clone(),
        };

        let delay = delay.filter(|delay| !delay.is_zero());
        match (delay, tokio::runtime::Handle::try_current()) {
            (Some(delay), Ok(handle)) => {
                let loader = self.loader.clone();
                let deadline = tokio::time::Instant::now() + delay;
                handle.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    loader.load(request);
                });
            }
            (Some(delay), Err(_)) => {
                warn!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "no async runtime available; loading vendor script without delay"
                );
                self.loader.load(request);
            }
            (None, _) => self.loader.load(request),
        }
    }
}
