//! Cancellable scheduled task.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Quiet period required before a debounced push fires.
pub const DEBOUNCE_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Runs the most recently scheduled task once no new one has arrived for
/// `delay`. Scheduling replaces (and cancels) the pending task.
///
/// Cancellation only reaches tasks still waiting out the quiet period; a
/// task that already started runs to completion.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_QUIET_PERIOD)
    }
}

impl Debouncer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so a later `cancel` cannot abort a push mid-flight.
            let _ = tokio::spawn(task).await;
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Drop the pending task, if any. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        pending.is_some_and(|handle| {
            let waiting = !handle.is_finished();
            handle.abort();
            waiting
        })
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the pending task to fire and finish.
    pub async fn flush(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            let _ = handle.await;
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
