//! The vendor entry point seam and the queueing stub installed before the real
//! script has loaded.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

/// Listener invoked by the vendor when an event it emits fires.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Positional argument handed to the vendor entry point.
#[derive(Clone)]
pub enum CommandArg {
    Value(Value),
    Listener(Listener),
}

impl CommandArg {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            CommandArg::Value(value) => Some(value),
            CommandArg::Listener(_) => None,
        }
    }

    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            CommandArg::Listener(listener) => Some(listener),
            CommandArg::Value(_) => None,
        }
    }
}

impl fmt::Debug for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            CommandArg::Listener(_) => f.write_str("Listener(..)"),
        }
    }
}

impl From<Value> for CommandArg {
    fn from(value: Value) -> Self {
        CommandArg::Value(value)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        CommandArg::Value(Value::from(value))
    }
}

impl From<i64> for CommandArg {
    fn from(value: i64) -> Self {
        CommandArg::Value(Value::from(value))
    }
}

/// The single global function the vendor script exposes, called as `(command, ...args)`.
pub trait EntryPoint: Send + Sync {
    fn call(&self, command: &str, args: Vec<CommandArg>) -> Option<Value>;
}

pub type SharedEntryPoint = Arc<dyn EntryPoint>;

#[derive(Debug, Clone)]
pub struct QueuedCall {
    pub command: String,
    pub args: Vec<CommandArg>,
}

/// Buffers calls until the real vendor script takes over.
#[derive(Default)]
pub struct StubEntryPoint {
    queue: Mutex<Vec<QueuedCall>>,
}

impl StubEntryPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued_len(&self) -> usize {
        match self.queue.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Replays every queued call, in order, against `target`.
    pub fn drain_into(&self, target: &dyn EntryPoint) -> usize {
        let drained = match self.queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let count = drained.len();
        for call in drained {
            target.call(&call.command, call.args);
        }
        debug!(count, "replayed queued vendor calls");
        count
    }
}

impl EntryPoint for StubEntryPoint {
    fn call(&self, command: &str, args: Vec<CommandArg>) -> Option<Value> {
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        queue.push(QueuedCall {
            command: command.to_string(),
            args,
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl EntryPoint for Collect {
        fn call(&self, command: &str, _args: Vec<CommandArg>) -> Option<Value> {
            self.0.lock().unwrap().push(command.to_string());
            Some(json!("real"))
        }
    }

    #[test]
    fn stub_queues_and_replays_in_order() {
        let stub = StubEntryPoint::new();
        assert_eq!(stub.call("boot", vec![json!({"app_id": "abc"}).into()]), None);
        stub.call("update", Vec::new());
        assert_eq!(stub.queued_len(), 2);

        let real = Collect::default();
        assert_eq!(stub.drain_into(&real), 2);
        assert_eq!(*real.0.lock().unwrap(), vec!["boot", "update"]);
        assert_eq!(stub.queued_len(), 0);
    }

    #[test]
    fn poisoned_queue_still_buffers_calls() {
        let stub = Arc::new(StubEntryPoint::new());
        stub.call("boot", Vec::new());

        let poisoner = stub.clone();
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.queue.lock().unwrap();
            panic!("poison the queue");
        })
        .join();
        assert!(joined.is_err());
        assert!(stub.queue.is_poisoned());

        stub.call("show", Vec::new());
        assert_eq!(stub.queued_len(), 2);

        let real = Collect::default();
        assert_eq!(stub.drain_into(&real), 2);
        assert_eq!(*real.0.lock().unwrap(), vec!["boot", "show"]);
    }

    #[test]
    fn listener_args_are_opaque_in_debug_output() {
        let arg = CommandArg::Listener(Arc::new(|_| {}));
        assert_eq!(format!("{arg:?}"), "Listener(..)");
        assert!(arg.as_value().is_none());
    }
}
