//! Boot state and the readiness reconciliation between self-initialising the
//! vendor script and waiting for an externally loaded instance.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use metrics::counter;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{ExecutionContext, ProviderCallbacks, ProviderConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{Rejection, WidgetError};
use crate::injector::ScriptInjector;
use crate::poller::Poller;
use crate::props::{RawSettings, WidgetProps, map_to_raw_settings};
use crate::registry::SharedRegistry;
use crate::vendor::{CommandArg, Listener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    NotBooted,
    Booted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    ExternalReady,
    Fallback,
}

#[derive(Debug)]
struct LifecycleState {
    boot: BootState,
    mounted: bool,
    initialized: bool,
    ping_started_at: Option<Instant>,
    open: bool,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            boot: BootState::NotBooted,
            mounted: false,
            initialized: false,
            ping_started_at: None,
            open: false,
        }
    }
}

pub(crate) struct Controller {
    config: ProviderConfig,
    callbacks: ProviderCallbacks,
    context: ExecutionContext,
    registry: SharedRegistry,
    injector: Arc<dyn ScriptInjector>,
    dispatcher: Dispatcher,
    state: Mutex<LifecycleState>,
    poller: Mutex<Poller>,
}

impl Controller {
    pub(crate) fn new(
        config: ProviderConfig,
        callbacks: ProviderCallbacks,
        context: ExecutionContext,
        registry: SharedRegistry,
        injector: Arc<dyn ScriptInjector>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry.clone()),
            config,
            callbacks,
            context,
            registry,
            injector,
            state: Mutex::new(LifecycleState::default()),
            poller: Mutex::new(Poller::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poller(&self) -> MutexGuard<'_, Poller> {
        self.poller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn should_initialize(&self) -> bool {
        self.config.should_initialize(self.context)
    }

    pub(crate) fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub(crate) fn boot_state(&self) -> BootState {
        self.state().boot
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state().open
    }

    pub(crate) fn is_pinging(&self) -> bool {
        self.state().ping_started_at.is_some()
    }

    /// Runs once per mount. Client-only.
    pub(crate) fn mount(self: &Arc<Self>) -> Result<(), WidgetError> {
        if self.context.is_server() {
            debug!("server-side render; skipping widget mount");
            return Ok(());
        }
        {
            let mut state = self.state();
            if state.mounted {
                return Ok(());
            }
            state.mounted = true;
        }

        if self.config.use_external_instance {
            return self.start_ping();
        }
        if !self.registry.is_loaded() && self.should_initialize() {
            return self.initialize();
        }
        debug!(
            app_id = %self.config.app_id,
            "vendor instance already present or initialisation disabled; not injecting"
        );
        Ok(())
    }

    pub(crate) fn unmount(&self) {
        self.poller().stop();
        let mut state = self.state();
        state.ping_started_at = None;
        state.mounted = false;
    }

    fn start_ping(self: &Arc<Self>) -> Result<(), WidgetError> {
        self.state().ping_started_at = Some(Instant::now());
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut poller = self.poller();
        poller.set_action(move || {
            if let Some(controller) = weak.upgrade() {
                controller.on_ping_tick();
            }
        });
        if let Err(err) = poller.start(self.config.ping_interval()) {
            drop(poller);
            let mut state = self.state();
            state.ping_started_at = None;
            state.mounted = false;
            return Err(err);
        }
        info!(
            app_id = %self.config.app_id,
            interval_ms = self.config.ping_interval_ms,
            fallback = self.config.external_fallback_enabled,
            "waiting for external widget instance"
        );
        Ok(())
    }

    fn on_ping_tick(self: &Arc<Self>) {
        let Some(started_at) = self.state().ping_started_at else {
            return;
        };
        let outcome = if self.registry.is_loaded() {
            PingOutcome::ExternalReady
        } else if self.config.external_fallback_enabled
            && started_at.elapsed() >= self.config.external_fallback_delay()
        {
            PingOutcome::Fallback
        } else {
            return;
        };

        self.state().ping_started_at = None;
        self.poller().stop();
        info!(
            ?outcome,
            elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "stopped waiting for external widget instance"
        );
        if outcome == PingOutcome::Fallback && !self.should_initialize() {
            warn!(
                app_id = %self.config.app_id,
                "no external widget instance appeared and initialisation is disabled; not injecting"
            );
            return;
        }
        if let Err(err) = self.initialize() {
            error!(error = %err, "widget initialisation failed after ping");
        }
    }

    fn initialize(self: &Arc<Self>) -> Result<(), WidgetError> {
        self.bootstrap()?;
        if self.config.auto_boot {
            self.boot(self.config.auto_boot_props.as_ref())?;
        }
        Ok(())
    }

    /// Injects the vendor script when nothing is loaded and attaches listeners, once.
    fn bootstrap(self: &Arc<Self>) -> Result<(), WidgetError> {
        {
            let mut state = self.state();
            if state.initialized {
                return Ok(());
            }
            state.initialized = true;
        }
        if !self.registry.is_loaded() {
            self.injector
                .initialize(&self.config.app_id, self.config.initialize_delay());
        }
        let attached = self.attach_listeners();
        if attached.is_err() {
            self.state().initialized = false;
        }
        attached
    }

    fn attach_listeners(self: &Arc<Self>) -> Result<(), WidgetError> {
        let on_hide = self.listener(|controller, _| {
            controller.state().open = false;
            if let Some(callback) = &controller.callbacks.on_hide {
                callback();
            }
        });
        let on_show = self.listener(|controller, _| {
            controller.state().open = true;
            if let Some(callback) = &controller.callbacks.on_show {
                callback();
            }
        });
        let on_unread = self.listener(|controller, args| {
            let count = args.first().and_then(Value::as_u64).unwrap_or(0);
            if let Some(callback) = &controller.callbacks.on_unread_count_change {
                callback(count);
            }
        });
        let on_email = self.listener(|controller, _| {
            if let Some(callback) = &controller.callbacks.on_user_email_supplied {
                callback();
            }
        });

        self.dispatcher
            .dispatch("onHide", vec![CommandArg::Listener(on_hide)])?;
        self.dispatcher
            .dispatch("onShow", vec![CommandArg::Listener(on_show)])?;
        self.dispatcher
            .dispatch("onUnreadCountChange", vec![CommandArg::Listener(on_unread)])?;
        self.dispatcher
            .dispatch("onUserEmailSupplied", vec![CommandArg::Listener(on_email)])?;
        Ok(())
    }

    fn listener(
        self: &Arc<Self>,
        handle: impl Fn(&Controller, &[Value]) + Send + Sync + 'static,
    ) -> Listener {
        let weak = Arc::downgrade(self);
        Arc::new(move |args: &[Value]| {
            if let Some(controller) = weak.upgrade() {
                handle(&controller, args);
            }
        })
    }

    pub(crate) fn boot(self: &Arc<Self>, props: Option<&WidgetProps>) -> Result<(), WidgetError> {
        if self.context.is_server() {
            debug!("server-side render; ignoring boot");
            return Ok(());
        }
        if !self.registry.is_loaded() && !self.should_initialize() {
            self.reject(Rejection::NotInitialized);
            return Ok(());
        }
        {
            let mut state = self.state();
            if state.boot == BootState::Booted {
                return Ok(());
            }
            state.boot = BootState::Booted;
        }

        let result = self.forward_boot(props);
        if result.is_err() {
            self.state().boot = BootState::NotBooted;
            return result;
        }
        info!(app_id = %self.config.app_id, "widget booted");
        if let Some(callback) = &self.callbacks.on_boot {
            callback();
        }
        Ok(())
    }

    fn forward_boot(self: &Arc<Self>, props: Option<&WidgetProps>) -> Result<(), WidgetError> {
        if !self.registry.is_loaded() {
            self.state().initialized = false;
            self.bootstrap()?;
        }

        let mut call_settings = RawSettings::new();
        call_settings.insert("app_id".into(), Value::from(self.config.app_id.clone()));
        if let Some(api_base) = &self.config.api_base {
            call_settings.insert("api_base".into(), Value::from(api_base.clone()));
        }
        if let Some(props) = props {
            call_settings.extend(map_to_raw_settings(props));
        }

        let mut settings = self.registry.settings().unwrap_or_default();
        settings.extend(call_settings);
        self.registry.set_settings(settings.clone());
        self.dispatcher
            .dispatch("boot", vec![CommandArg::Value(Value::Object(settings))])?;
        Ok(())
    }

    pub(crate) fn shutdown(&self) -> Result<(), WidgetError> {
        if self.state().boot == BootState::NotBooted {
            return Ok(());
        }
        self.dispatcher.dispatch("shutdown", Vec::new())?;
        let mut state = self.state();
        state.boot = BootState::NotBooted;
        state.open = false;
        info!(app_id = %self.config.app_id, "widget shut down");
        Ok(())
    }

    /// Shuts down and drops the vendor handle and settings blob entirely.
    /// No-op before boot, like `shutdown`.
    pub(crate) fn hard_shutdown(&self) -> Result<(), WidgetError> {
        if self.state().boot == BootState::NotBooted {
            debug!("hard_shutdown before boot; leaving vendor handle in place");
            return Ok(());
        }
        let result = self.dispatcher.dispatch("shutdown", Vec::new()).map(|_| ());
        self.registry.clear();
        {
            let mut state = self.state();
            state.boot = BootState::NotBooted;
            state.initialized = false;
            state.open = false;
        }
        info!(app_id = %self.config.app_id, "widget torn down");
        result
    }

    /// Runs `action` only when the widget is loaded (or may be) and booted.
    pub(crate) fn ensure_ready<R>(
        &self,
        operation: &'static str,
        action: impl FnOnce(&Dispatcher) -> Result<R, WidgetError>,
    ) -> Result<Option<R>, WidgetError> {
        if self.context.is_server() {
            debug!(operation, "server-side render; ignoring widget command");
            return Ok(None);
        }
        if !self.registry.is_loaded() && !self.should_initialize() {
            self.reject(Rejection::NotInitialized);
            return Ok(None);
        }
        if self.state().boot == BootState::NotBooted {
            self.reject(Rejection::NotBooted { operation });
            return Ok(None);
        }
        action(&self.dispatcher).map(Some)
    }

    pub(crate) fn update(&self, props: Option<&WidgetProps>) -> Result<(), WidgetError> {
        self.ensure_ready("update", |dispatcher| {
            let payload = match props {
                None => json!({ "last_request_at": OffsetDateTime::now_utc().unix_timestamp() }),
                Some(props) => {
                    let raw = map_to_raw_settings(props);
                    let mut settings = self.registry.settings().unwrap_or_default();
                    settings.extend(raw.clone());
                    self.registry.set_settings(settings);
                    Value::Object(raw)
                }
            };
            dispatcher.dispatch("update", vec![CommandArg::Value(payload)])
        })?;
        Ok(())
    }

    fn reject(&self, rejection: Rejection) {
        counter!("widget_guard_rejections_total", "reason" => rejection.reason()).increment(1);
        warn!(reason = rejection.reason(), "{rejection}");
    }
}
