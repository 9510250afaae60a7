use std::{collections::HashMap, time::Duration};

use log::debug;
use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// A repeating wake-up.
struct Trigger {
    interval: Duration,
    handle: JoinHandle<()>,
}

/// Keeps the repeating wake-up triggers of a service, at most one per key.
///
/// Every tick sends the trigger's key through the wake channel. If the previous wake-up
/// is still pending the tick is dropped, so wake-ups never pile up.
pub struct Scheduler {
    wake: mpsc::Sender<String>,
    triggers: Mutex<HashMap<String, Trigger>>,
}

impl Scheduler {
    /// Creates a new `Scheduler`.
    ///
    /// # Arguments
    /// * `wake` - Where the keys of the triggers that fire are sent.
    pub fn new(wake: mpsc::Sender<String>) -> Self {
        Self {
            wake,
            triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a trigger firing every `interval`, the first time one `interval` from now.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `key` - Identifies the trigger.
    /// * `interval` - The time between two wake-ups.
    ///
    /// # Returns
    /// `false` if an identical trigger was already registered, `true` if a new one was
    /// registered, replacing the previous one under `key` if there was any.
    pub fn register(&self, key: &str, interval: Duration) -> bool {
        let mut triggers = self.triggers.lock();

        if let Some(trigger) = triggers.get(key) {
            if trigger.interval == interval && !trigger.handle.is_finished() {
                return false;
            }
            trigger.handle.abort();
        }

        let handle = tokio::spawn(tick(key.to_string(), interval, self.wake.clone()));
        triggers.insert(key.to_string(), Trigger { interval, handle });
        debug!(key = key, interval_secs = interval.as_secs(); "trigger registered");
        true
    }

    /// Cancels the trigger under `key`.
    ///
    /// # Returns
    /// Whether there was such a trigger.
    pub fn cancel(&self, key: &str) -> bool {
        match self.triggers.lock().remove(key) {
            Some(trigger) => {
                trigger.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, trigger) in self.triggers.lock().drain() {
            trigger.handle.abort();
        }
    }

    /// Returns the amount of registered triggers that are still running.
    pub fn active(&self) -> usize {
        self.triggers
            .lock()
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn tick(key: String, interval: Duration, wake: mpsc::Sender<String>) {
    let mut ticks = time::interval_at(Instant::now() + interval, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;

        match wake.try_send(key.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!(key = key.as_str(); "wake-up already pending"),
            Err(TrySendError::Closed(_)) => break,
        }
    }
}
