//! Integration layer for an embedded customer-messaging widget.
//!
//! A [`WidgetProvider`] decides, once per mount, whether to inject the vendor
//! script itself or wait for an externally loaded instance, and tracks whether
//! the widget has booted. Consumers drive the widget through a [`WidgetContext`],
//! whose commands are forwarded to the vendor entry point held in a
//! [`VendorHandleRegistry`] only once the widget is ready.
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod injector;
pub mod lifecycle;
pub mod poller;
pub mod props;
pub mod registry;
pub mod vendor;

pub use config::{
    Callback, ExecutionContext, ProviderCallbacks, ProviderConfig, UnreadCountCallback,
};
pub use context::{ProviderBuilder, WidgetContext, WidgetProvider};
pub use dispatcher::Dispatcher;
pub use error::{Rejection, WidgetError};
pub use injector::{
    LoadRequest, LoggingLoader, ScriptInjector, ScriptLoader, StubInjector, widget_script_url,
};
pub use lifecycle::{BootState, PingOutcome};
pub use poller::Poller;
pub use props::{Avatar, Company, RawSettings, WidgetProps, map_to_raw_settings};
pub use registry::{MemoryRegistry, SharedRegistry, VendorHandleRegistry, global_registry};
pub use vendor::{CommandArg, EntryPoint, Listener, QueuedCall, SharedEntryPoint, StubEntryPoint};
