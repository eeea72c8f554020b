//! Recording fakes standing in for the vendor script in tests and the simulator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mw_core::{CommandArg, EntryPoint, Listener, ScriptInjector, SharedEntryPoint, SharedRegistry};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub values: Vec<Value>,
    pub listeners: usize,
}

impl RecordedCall {
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }
}

type Observer = Arc<dyn Fn(&RecordedCall) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Entry point that records every call and keeps the listeners registered through it.
#[derive(Default)]
pub struct RecordingEntryPoint {
    calls: Mutex<Vec<RecordedCall>>,
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    responses: Mutex<HashMap<String, Value>>,
    observer: Option<Observer>,
}

impl RecordingEntryPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Invokes `observer` for every call as it is recorded.
    pub fn with_observer(observer: impl Fn(&RecordedCall) + Send + Sync + 'static) -> Self {
        Self {
            observer: Some(Arc::new(observer)),
            ..Self::default()
        }
    }

    /// Makes `command` return `value`.
    pub fn respond(&self, command: &str, value: Value) {
        lock(&self.responses).insert(command.to_string(), value);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.command.clone()).collect()
    }

    pub fn count(&self, command: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.command == command)
            .count()
    }

    pub fn last(&self, command: &str) -> Option<RecordedCall> {
        lock(&self.calls)
            .iter()
            .rev()
            .find(|c| c.command == command)
            .cloned()
    }

    /// Fires the listeners registered via `on<Event>` commands, e.g. `emit("onShow", &[])`.
    pub fn emit(&self, event: &str, args: &[Value]) -> usize {
        let listeners = lock(&self.listeners).get(event).cloned().unwrap_or_default();
        for listener in &listeners {
            listener(args);
        }
        listeners.len()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

impl EntryPoint for RecordingEntryPoint {
    fn call(&self, command: &str, args: Vec<CommandArg>) -> Option<Value> {
        let mut values = Vec::new();
        let mut listeners = 0;
        for arg in args {
            match arg {
                CommandArg::Value(value) => values.push(value),
                CommandArg::Listener(listener) => {
                    listeners += 1;
                    lock(&self.listeners)
                        .entry(command.to_string())
                        .or_default()
                        .push(listener);
                }
            }
        }
        let call = RecordedCall {
            command: command.to_string(),
            values,
            listeners,
        };
        if let Some(observer) = &self.observer {
            observer(&call);
        }
        lock(&self.calls).push(call);
        lock(&self.responses).get(command).cloned()
    }
}

/// Injector that records requests and, when configured, installs an entry point
/// synchronously as if the script loaded instantly.
#[derive(Default)]
pub struct RecordingInjector {
    requests: Mutex<Vec<(String, Option<Duration>)>>,
    install: Option<(SharedRegistry, SharedEntryPoint)>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installing(registry: SharedRegistry, entry_point: SharedEntryPoint) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            install: Some((registry, entry_point)),
        }
    }

    pub fn requests(&self) -> Vec<(String, Option<Duration>)> {
        lock(&self.requests).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl ScriptInjector for RecordingInjector {
    fn initialize(&self, app_id: &str, delay: Option<Duration>) {
        lock(&self.requests).push((app_id.to_string(), delay));
        if let Some((registry, entry_point)) = &self.install {
            registry.set_entry_point(entry_point.clone());
        }
    }
}
