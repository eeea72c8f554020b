//! The provider that owns the widget lifecycle, and the context handle handed to
//! descendants.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{ExecutionContext, ProviderCallbacks, ProviderConfig};
use crate::error::WidgetError;
use crate::injector::{LoggingLoader, ScriptInjector, StubInjector};
use crate::lifecycle::{BootState, Controller};
use crate::props::WidgetProps;
use crate::registry::{SharedRegistry, global_registry};
use crate::vendor::CommandArg;

pub struct ProviderBuilder {
    config: ProviderConfig,
    callbacks: ProviderCallbacks,
    context: ExecutionContext,
    registry: Option<SharedRegistry>,
    injector: Option<Arc<dyn ScriptInjector>>,
}

impl ProviderBuilder {
    pub fn callbacks(mut self, callbacks: ProviderCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn execution_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Defaults to the process-wide registry.
    pub fn registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Defaults to a [`StubInjector`] with a [`LoggingLoader`] over the same registry.
    pub fn injector(mut self, injector: Arc<dyn ScriptInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn build(self) -> WidgetProvider {
        let registry = self.registry.unwrap_or_else(global_registry);
        let injector = self
            .injector
            .unwrap_or_else(|| Arc::new(StubInjector::new(registry.clone(), LoggingLoader)));
        WidgetProvider {
            controller: Arc::new(Controller::new(
                self.config,
                self.callbacks,
                self.context,
                registry,
                injector,
            )),
        }
    }
}

/// Owns the lifecycle for one mount. Dropping the provider unmounts it.
pub struct WidgetProvider {
    controller: Arc<Controller>,
}

impl WidgetProvider {
    pub fn builder(config: ProviderConfig) -> ProviderBuilder {
        ProviderBuilder {
            config,
            callbacks: ProviderCallbacks::default(),
            context: ExecutionContext::default(),
            registry: None,
            injector: None,
        }
    }

    /// Decides between initialising now and waiting for an external instance.
    ///
    /// Waiting uses a timer, so this must run inside a tokio runtime when
    /// `use_external_instance` is set.
    pub fn mount(&self) -> Result<(), WidgetError> {
        self.controller.mount()
    }

    pub fn unmount(&self) {
        self.controller.unmount();
    }

    pub fn context(&self) -> WidgetContext {
        WidgetContext {
            controller: self.controller.clone(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        self.controller.config()
    }

    pub fn is_waiting_for_external(&self) -> bool {
        self.controller.is_pinging()
    }
}

impl Drop for WidgetProvider {
    fn drop(&mut self) {
        self.controller.unmount();
    }
}

/// Cloneable handle exposing widget commands to consumers.
///
/// Every command except `boot` and the shutdowns goes through the readiness
/// guard: before boot it logs a warning and does nothing.
#[derive(Clone)]
pub struct WidgetContext {
    controller: Arc<Controller>,
}

impl WidgetContext {
    pub fn boot(&self, props: Option<&WidgetProps>) -> Result<(), WidgetError> {
        self.controller.boot(props)
    }

    pub fn shutdown(&self) -> Result<(), WidgetError> {
        self.controller.shutdown()
    }

    pub fn hard_shutdown(&self) -> Result<(), WidgetError> {
        self.controller.hard_shutdown()
    }

    /// Without props, only refreshes `last_request_at`.
    pub fn update(&self, props: Option<&WidgetProps>) -> Result<(), WidgetError> {
        self.controller.update(props)
    }

    pub fn hide(&self) -> Result<(), WidgetError> {
        self.command("hide", "hide", Vec::new())
    }

    pub fn show(&self) -> Result<(), WidgetError> {
        self.command("show", "show", Vec::new())
    }

    pub fn show_messages(&self) -> Result<(), WidgetError> {
        self.command("show_messages", "showMessages", Vec::new())
    }

    pub fn show_new_messages(&self, prefilled: Option<&str>) -> Result<(), WidgetError> {
        let args = prefilled.map(CommandArg::from).into_iter().collect();
        self.command("show_new_messages", "showNewMessage", args)
    }

    pub fn get_visitor_id(&self) -> Result<Option<String>, WidgetError> {
        let value = self.controller.ensure_ready("get_visitor_id", |dispatcher| {
            dispatcher.dispatch("getVisitorId", Vec::new())
        })?;
        Ok(value
            .flatten()
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    pub fn start_tour(&self, tour_id: i64) -> Result<(), WidgetError> {
        self.command("start_tour", "startTour", vec![tour_id.into()])
    }

    pub fn track_event(&self, event: &str, metadata: Option<Value>) -> Result<(), WidgetError> {
        let mut args = vec![CommandArg::from(event)];
        args.extend(metadata.map(CommandArg::Value));
        self.command("track_event", "trackEvent", args)
    }

    pub fn show_article(&self, article_id: i64) -> Result<(), WidgetError> {
        self.command("show_article", "showArticle", vec![article_id.into()])
    }

    pub fn start_survey(&self, survey_id: i64) -> Result<(), WidgetError> {
        self.command("start_survey", "startSurvey", vec![survey_id.into()])
    }

    /// One of `home`, `messages`, `help`, `news`, `tasks`, `tickets`.
    pub fn show_space(&self, space: &str) -> Result<(), WidgetError> {
        self.command("show_space", "showSpace", vec![space.into()])
    }

    pub fn show_ticket(&self, ticket_id: i64) -> Result<(), WidgetError> {
        self.command("show_ticket", "showTicket", vec![ticket_id.into()])
    }

    pub fn show_conversation(&self, conversation_id: i64) -> Result<(), WidgetError> {
        self.command(
            "show_conversation",
            "showConversation",
            vec![conversation_id.into()],
        )
    }

    pub fn start_checklist(&self, checklist_id: i64) -> Result<(), WidgetError> {
        self.command("start_checklist", "startChecklist", vec![checklist_id.into()])
    }

    pub fn is_open(&self) -> bool {
        self.controller.is_open()
    }

    pub fn is_booted(&self) -> bool {
        self.controller.boot_state() == BootState::Booted
    }

    fn command(
        &self,
        operation: &'static str,
        command: &str,
        args: Vec<CommandArg>,
    ) -> Result<(), WidgetError> {
        self.controller
            .ensure_ready(operation, |dispatcher| dispatcher.dispatch(command, args))?;
        Ok(())
    }
}
