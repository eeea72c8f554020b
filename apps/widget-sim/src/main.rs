use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use mw_core::{
    LoadRequest, MemoryRegistry, ProviderCallbacks, ProviderConfig, ScriptLoader, StubInjector,
    VendorHandleRegistry, WidgetProps, WidgetProvider,
};
use mw_testutil::{RecordedCall, RecordingEntryPoint};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Messenger widget lifecycle simulator")]
struct Cli {
    /// Emit one JSON object per forwarded command
    #[arg(long)]
    json: bool,
    #[arg(long, default_value = "demo-app")]
    app_id: String,
    /// Boot as soon as the widget is initialised
    #[arg(long)]
    auto_boot: bool,
    /// Wait for an externally loaded instance instead of injecting
    #[arg(long)]
    external: bool,
    /// When waiting externally, make the instance appear after this many ms
    #[arg(long)]
    appear_after_ms: Option<u64>,
    #[arg(long, default_value_t = 30_000)]
    fallback_delay_ms: u64,
    #[arg(long)]
    no_fallback: bool,
    #[arg(long, default_value_t = 1_000)]
    ping_interval_ms: u64,
    /// Time the simulated script takes to load after injection
    #[arg(long, default_value_t = 200)]
    script_latency_ms: u64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// Events to track once booted
    #[arg(long = "event")]
    events: Vec<String>,
    /// How long to let the lifecycle run before issuing commands
    #[arg(long, default_value_t = 3_000)]
    run_ms: u64,
}

#[derive(Serialize)]
struct Printed<'a> {
    command: &'a str,
    values: &'a [Value],
    listeners: usize,
}

struct SimulatedScript {
    latency: Duration,
    vendor: Arc<RecordingEntryPoint>,
}

impl ScriptLoader for SimulatedScript {
    fn load(&self, request: LoadRequest) {
        let latency = self.latency;
        let vendor = self.vendor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            request.complete(vendor);
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    mw_telemetry::install("widget-sim")?;
    let cli = Cli::parse();

    let json_output = cli.json;
    let vendor = Arc::new(RecordingEntryPoint::with_observer(move |call| {
        print_call(call, json_output)
    }));
    vendor.respond("getVisitorId", json!("sim-visitor-1"));

    let registry = MemoryRegistry::shared();
    let injector = StubInjector::new(
        registry.clone(),
        SimulatedScript {
            latency: Duration::from_millis(cli.script_latency_ms),
            vendor: vendor.clone(),
        },
    );

    let props = WidgetProps {
        name: cli.name.clone(),
        email: cli.email.clone(),
        ..WidgetProps::default()
    };
    let mut config = ProviderConfig::new(cli.app_id.clone())
        .with_ping_interval(Duration::from_millis(cli.ping_interval_ms));
    if cli.auto_boot {
        config = config.with_auto_boot(Some(props.clone()));
    }
    if cli.external {
        let fallback =
            (!cli.no_fallback).then(|| Duration::from_millis(cli.fallback_delay_ms));
        config = config.with_external_instance(fallback);
    }

    if let (true, Some(after)) = (cli.external, cli.appear_after_ms) {
        let registry = registry.clone();
        let vendor = vendor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after)).await;
            info!(after_ms = after, "external widget instance appeared");
            registry.set_entry_point(vendor);
        });
    }

    let provider = WidgetProvider::builder(config)
        .registry(registry.clone())
        .injector(Arc::new(injector))
        .callbacks(ProviderCallbacks::default().on_boot(|| info!("boot callback fired")))
        .build();
    provider.mount()?;

    tokio::time::sleep(Duration::from_millis(cli.run_ms)).await;

    let ctx = provider.context();
    if !cli.auto_boot {
        ctx.boot(Some(&props))?;
    }
    for event in &cli.events {
        ctx.track_event(event, None)?;
    }
    ctx.update(None)?;
    let visitor = ctx.get_visitor_id()?;

    // Let a still-loading script drain its queue before reporting.
    tokio::time::sleep(Duration::from_millis(cli.script_latency_ms)).await;

    let summary = json!({
        "booted": ctx.is_booted(),
        "waiting_for_external": provider.is_waiting_for_external(),
        "vendor_loaded": registry.is_loaded(),
        "visitor_id": visitor,
        "commands": vendor.commands().len(),
    });
    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("summary: {}", serde_json::to_string_pretty(&summary)?);
    }

    ctx.shutdown()?;
    Ok(())
}

fn print_call(call: &RecordedCall, json_output: bool) {
    if json_output {
        let printed = Printed {
            command: &call.command,
            values: &call.values,
            listeners: call.listeners,
        };
        if let Ok(line) = serde_json::to_string(&printed) {
            println!("{line}");
        }
        return;
    }
    let args: Vec<String> = call.values.iter().map(Value::to_string).collect();
    let listeners = if call.listeners > 0 {
        format!(" (+{} listener)", call.listeners)
    } else {
        String::new()
    };
    println!("-> {}({}){}", call.command, args.join(", "), listeners);
}
