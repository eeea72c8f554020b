//! Repeating timer whose action can be swapped without resetting the schedule.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::WidgetError;

pub type Action = Arc<dyn Fn() + Send + Sync>;

/// Owns at most one running interval task.
///
/// The action is read at each tick, so replacing it takes effect on the next tick
/// without touching the countdown. Only a change of interval re-arms the timer.
/// Panics raised by the action are not caught here.
pub struct Poller {
    action: Arc<Mutex<Option<Action>>>,
    interval: Option<Duration>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            action: Arc::new(Mutex::new(None)),
            interval: None,
            task: None,
        }
    }

    pub fn set_action(&mut self, action: impl Fn() + Send + Sync + 'static) {
        let action: Action = Arc::new(action);
        match self.action.lock() {
            Ok(mut slot) => *slot = Some(action),
            Err(poisoned) => *poisoned.into_inner() = Some(action),
        }
    }

    /// Declarative form: `None` disables the timer. Re-arms only when the value changes.
    pub fn set_interval(&mut self, interval: Option<Duration>) -> Result<(), WidgetError> {
        match interval {
            Some(interval) => self.start(interval),
            None => {
                self.stop();
                Ok(())
            }
        }
    }

    /// Fails with `NoRuntime` outside a tokio runtime, leaving the poller disarmed.
    pub fn start(&mut self, interval: Duration) -> Result<(), WidgetError> {
        if self.interval == Some(interval) && self.is_armed() {
            return Ok(());
        }
        self.stop();
        let runtime =
            Handle::try_current().map_err(|_| WidgetError::NoRuntime("start the poller"))?;

        let period = interval.max(Duration::from_millis(1));
        let action = self.action.clone();
        let first_tick = Instant::now() + period;
        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let current = match action.lock() {
                    Ok(slot) => slot.clone(),
                    Err(poisoned) => poisoned.into_inner().clone(),
                };
                if let Some(current) = current {
                    current();
                }
            }
        }));
        self.interval = Some(interval);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.interval = None;
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
