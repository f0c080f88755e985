//! Abortable one-shot timer slots.
//!
//! The orchestrator owns exactly three of these (deadline, nudge,
//! auto-resolve). Re-arming cancels the previous task; cancellation is
//! idempotent and safe from any thread.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub(crate) struct TimerSlot {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    /// Arm the slot: after `delay`, run `fire`. Replaces any armed task.
    pub(crate) fn arm<F>(&self, delay: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = self.name;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::trace!(timer = name, "timer fired");
            fire.await;
        });
        if let Some(previous) = self.handle.lock().replace(task) {
            previous.abort();
        }
    }

    /// Cancel the armed task, if any.
    pub(crate) fn cancel(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
