use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};
use std::time::Duration;

use mw_core::{
    ExecutionContext, MemoryRegistry, ProviderCallbacks, ProviderConfig, RawSettings,
    SharedRegistry, VendorHandleRegistry, WidgetError, WidgetProps, WidgetProvider,
};
use mw_testutil::{RecordingEntryPoint, RecordingInjector};
use serde_json::{Value, json};

struct Harness {
    provider: WidgetProvider,
    registry: SharedRegistry,
    vendor: Arc<RecordingEntryPoint>,
    injector: Arc<RecordingInjector>,
}

fn harness(config: ProviderConfig) -> Harness {
    harness_with(config, ProviderCallbacks::default(), ExecutionContext::Client)
}

fn harness_with(
    config: ProviderConfig,
    callbacks: ProviderCallbacks,
    context: ExecutionContext,
) -> Harness {
    let registry = MemoryRegistry::shared();
    let vendor = RecordingEntryPoint::shared();
    let injector = Arc::new(RecordingInjector::installing(
        registry.clone(),
        vendor.clone(),
    ));
    let provider = WidgetProvider::builder(config)
        .registry(registry.clone())
        .injector(injector.clone())
        .callbacks(callbacks)
        .execution_context(context)
        .build();
    Harness {
        provider,
        registry,
        vendor,
        injector,
    }
}

#[test]
fn mount_initialises_without_auto_boot_and_explicit_boot_forwards_settings() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();

    assert_eq!(h.injector.requests(), vec![("app-1".to_string(), None)]);
    assert_eq!(h.vendor.count("boot"), 0);
    for listener in ["onHide", "onShow", "onUnreadCountChange", "onUserEmailSupplied"] {
        assert_eq!(h.vendor.count(listener), 1, "{listener} attached once");
    }

    let ctx = h.provider.context();
    ctx.boot(Some(&WidgetProps::default().with_name("Jane")))
        .unwrap();

    let boot = h.vendor.last("boot").expect("boot forwarded");
    assert_eq!(boot.values, vec![json!({"app_id": "app-1", "name": "Jane"})]);
    assert!(ctx.is_booted());
    assert_eq!(
        h.registry.settings().map(Value::Object),
        Some(json!({"app_id": "app-1", "name": "Jane"}))
    );
}

#[test]
fn mounting_twice_initialises_once() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();
    h.provider.mount().unwrap();
    assert_eq!(h.injector.count(), 1);
    assert_eq!(h.vendor.count("onShow"), 1);
}

#[test]
fn existing_vendor_handle_skips_synchronous_initialisation() {
    let h = harness(ProviderConfig::new("app-1"));
    h.registry.set_entry_point(h.vendor.clone());
    h.provider.mount().unwrap();
    assert_eq!(h.injector.count(), 0);
    assert_eq!(h.vendor.count("onShow"), 0);
}

#[test]
fn auto_boot_boots_on_mount_with_props() {
    let config = ProviderConfig::new("app-1")
        .with_api_base("https://api-iam.eu.intercom.io")
        .with_auto_boot(Some(WidgetProps::default().with_email("jane@example.com")));
    let booted = Arc::new(AtomicUsize::new(0));
    let seen = booted.clone();
    let callbacks = ProviderCallbacks::default().on_boot(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let h = harness_with(config, callbacks, ExecutionContext::Client);

    h.provider.mount().unwrap();

    let boot = h.vendor.last("boot").expect("auto boot");
    assert_eq!(
        boot.first_value(),
        Some(&json!({
            "app_id": "app-1",
            "api_base": "https://api-iam.eu.intercom.io",
            "email": "jane@example.com"
        }))
    );
    assert_eq!(booted.load(Ordering::SeqCst), 1);
}

#[test]
fn repeated_boot_forwards_once() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();
    for _ in 0..5 {
        ctx.boot(None).unwrap();
    }
    assert_eq!(h.vendor.count("boot"), 1);
}

#[test]
fn shutdown_without_boot_is_a_no_op() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();
    ctx.shutdown().unwrap();
    ctx.shutdown().unwrap();
    assert_eq!(h.vendor.count("shutdown"), 0);

    ctx.boot(None).unwrap();
    ctx.shutdown().unwrap();
    ctx.shutdown().unwrap();
    assert_eq!(h.vendor.count("shutdown"), 1);
    assert!(!ctx.is_booted());

    ctx.boot(None).unwrap();
    assert_eq!(h.vendor.count("boot"), 2);
}

#[test]
fn hard_shutdown_clears_globals_and_boot_reinitialises() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();
    ctx.boot(None).unwrap();

    ctx.hard_shutdown().unwrap();
    assert_eq!(h.vendor.count("shutdown"), 1);
    assert!(h.registry.entry_point().is_none());
    assert!(h.registry.settings().is_none());
    assert!(!ctx.is_booted());

    ctx.boot(None).unwrap();
    assert!(ctx.is_booted());
    assert_eq!(h.injector.count(), 2);
    assert_eq!(h.vendor.count("boot"), 2);
    assert_eq!(h.vendor.count("onShow"), 2);
}

#[test]
fn hard_shutdown_before_boot_leaves_a_foreign_instance_alone() {
    let h = harness(ProviderConfig::new("app-1"));
    let foreign = RecordingEntryPoint::shared();
    let mut settings = RawSettings::new();
    settings.insert("app_id".into(), json!("someone-else"));
    h.registry.set_entry_point(foreign.clone());
    h.registry.set_settings(settings.clone());

    h.provider.mount().unwrap();
    let ctx = h.provider.context();
    ctx.hard_shutdown().unwrap();

    assert!(h.registry.entry_point().is_some());
    assert_eq!(h.registry.settings(), Some(settings));
    assert_eq!(foreign.count("shutdown"), 0);
    assert_eq!(h.injector.count(), 0);
    assert!(!ctx.is_booted());
}

#[test]
fn mounting_an_external_wait_outside_a_runtime_is_an_error() {
    let h = harness(
        ProviderConfig::new("app-1").with_external_instance(Some(Duration::from_secs(5))),
    );

    let err = h.provider.mount().unwrap_err();
    assert!(matches!(err, WidgetError::NoRuntime(_)));
    assert!(!h.provider.is_waiting_for_external());
    assert_eq!(h.injector.count(), 0);
}

#[test]
fn boot_merges_external_settings_with_call_settings_winning() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();
    let mut external = RawSettings::new();
    external.insert("app_id".into(), json!("someone-else"));
    external.insert("hide_default_launcher".into(), json!(true));
    h.registry.set_settings(external);

    h.provider
        .context()
        .boot(Some(&WidgetProps::default().with_name("Jane")))
        .unwrap();

    assert_eq!(
        h.vendor.last("boot").unwrap().first_value(),
        Some(&json!({"app_id": "app-1", "hide_default_launcher": true, "name": "Jane"}))
    );
}

#[test]
#[tracing_test::traced_test]
fn commands_before_boot_warn_and_do_nothing() {
    let h = harness(ProviderConfig::new("app-1"));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();

    ctx.show().unwrap();
    ctx.track_event("signup", None).unwrap();
    assert_eq!(ctx.get_visitor_id().unwrap(), None);

    assert_eq!(h.vendor.count("show"), 0);
    assert_eq!(h.vendor.count("trackEvent"), 0);
    assert_eq!(h.vendor.count("getVisitorId"), 0);
    assert!(logs_contain("`track_event` was called before the widget booted"));
}

#[test]
#[tracing_test::traced_test]
fn without_permission_to_initialise_nothing_happens() {
    let h = harness(ProviderConfig::new("app-1").with_should_initialize(false));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();

    ctx.boot(None).unwrap();
    ctx.hide().unwrap();

    assert_eq!(h.injector.count(), 0);
    assert!(h.vendor.calls().is_empty());
    assert!(!ctx.is_booted());
    assert!(logs_contain("widget is not initialized"));
}

#[test]
fn server_side_context_has_no_side_effects() {
    let h = harness_with(
        ProviderConfig::new("app-1").with_auto_boot(None),
        ProviderCallbacks::default(),
        ExecutionContext::Server,
    );
    h.provider.mount().unwrap();
    let ctx = h.provider.context();
    ctx.boot(None).unwrap();
    ctx.show().unwrap();

    assert_eq!(h.injector.count(), 0);
    assert!(h.vendor.calls().is_empty());
}

#[test]
fn booted_commands_are_forwarded() {
    let h = harness(ProviderConfig::new("app-1").with_auto_boot(None));
    h.vendor.respond("getVisitorId", json!("visitor-42"));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();

    ctx.hide().unwrap();
    ctx.show().unwrap();
    ctx.show_messages().unwrap();
    ctx.show_new_messages(None).unwrap();
    ctx.show_new_messages(Some("Hi there")).unwrap();
    ctx.start_tour(12).unwrap();
    ctx.track_event("invited-friend", None).unwrap();
    ctx.track_event("purchase", Some(json!({"price": 10})))
        .unwrap();
    ctx.show_article(7).unwrap();
    ctx.start_survey(8).unwrap();
    ctx.show_space("help").unwrap();
    ctx.show_ticket(9).unwrap();
    ctx.show_conversation(10).unwrap();
    ctx.start_checklist(11).unwrap();

    assert_eq!(ctx.get_visitor_id().unwrap().as_deref(), Some("visitor-42"));
    assert_eq!(
        h.vendor.last("showNewMessage").unwrap().values,
        vec![json!("Hi there")]
    );
    assert_eq!(
        h.vendor.last("trackEvent").unwrap().values,
        vec![json!("purchase"), json!({"price": 10})]
    );
    let calls = h.vendor.calls();
    let invited = calls
        .iter()
        .find(|c| c.first_value() == Some(&json!("invited-friend")))
        .unwrap();
    assert_eq!(invited.values.len(), 1);
    assert_eq!(h.vendor.last("startTour").unwrap().values, vec![json!(12)]);
    assert_eq!(h.vendor.last("showSpace").unwrap().values, vec![json!("help")]);
    for command in [
        "hide",
        "show",
        "showMessages",
        "showArticle",
        "startSurvey",
        "showTicket",
        "showConversation",
        "startChecklist",
    ] {
        assert_eq!(h.vendor.count(command), 1, "{command}");
    }
}

#[test]
fn update_without_props_refreshes_only_the_timestamp() {
    let h = harness(ProviderConfig::new("app-1").with_auto_boot(None));
    h.provider.mount().unwrap();
    let ctx = h.provider.context();

    ctx.update(None).unwrap();
    let refresh = h.vendor.last("update").unwrap();
    let payload = refresh.first_value().and_then(Value::as_object).unwrap();
    assert_eq!(payload.len(), 1);
    assert!(payload["last_request_at"].as_i64().unwrap() > 1_600_000_000);

    ctx.update(Some(&WidgetProps::default().with_user_id("u-7")))
        .unwrap();
    assert_eq!(
        h.vendor.last("update").unwrap().values,
        vec![json!({"user_id": "u-7"})]
    );
    assert_eq!(
        h.registry.settings().unwrap().get("user_id"),
        Some(&json!("u-7"))
    );
}

#[test]
fn vendor_events_drive_open_state_and_callbacks() {
    let unread = Arc::new(AtomicU64::new(0));
    let shown = Arc::new(AtomicUsize::new(0));
    let emails = Arc::new(AtomicUsize::new(0));
    let callbacks = ProviderCallbacks::default()
        .on_show({
            let shown = shown.clone();
            move || {
                shown.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_unread_count_change({
            let unread = unread.clone();
            move |count| unread.store(count, Ordering::SeqCst)
        })
        .on_user_email_supplied({
            let emails = emails.clone();
            move || {
                emails.fetch_add(1, Ordering::SeqCst);
            }
        });
    let h = harness_with(
        ProviderConfig::new("app-1").with_auto_boot(None),
        callbacks,
        ExecutionContext::Client,
    );
    h.provider.mount().unwrap();
    let ctx = h.provider.context();

    assert!(!ctx.is_open());
    h.vendor.emit("onShow", &[]);
    assert!(ctx.is_open());
    assert_eq!(shown.load(Ordering::SeqCst), 1);
    h.vendor.emit("onHide", &[]);
    assert!(!ctx.is_open());

    h.vendor.emit("onUnreadCountChange", &[json!(3)]);
    assert_eq!(unread.load(Ordering::SeqCst), 3);
    h.vendor.emit("onUserEmailSupplied", &[]);
    assert_eq!(emails.load(Ordering::SeqCst), 1);
}

#[test]
fn dispatch_without_entry_point_is_a_hard_failure() {
    let h = harness(ProviderConfig::new("app-1").with_auto_boot(None));
    h.provider.mount().unwrap();
    h.registry.clear();

    let err = h.provider.context().hide().unwrap_err();
    assert!(matches!(err, WidgetError::VendorNotLoaded { ref command } if command == "hide"));
}
