//! Cancellable deferred reconnect.
//!
//! [`RetryTimer`] holds at most one pending retry. Arming it cancels the
//! previous one, so there is never more than a single retry waiting.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Pending {
    deadline: Instant,
    cancel: CancellationToken,
}

/// Slot for the single pending reconnect of a connection.
#[derive(Debug, Default)]
pub struct RetryTimer {
    pending: Option<Pending>,
}

impl RetryTimer {
    /// Creates an idle timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a retry `delay` from now, cancelling any retry already
    /// pending.
    pub fn arm(&mut self, delay: Duration) -> ScheduledRetry {
        self.cancel();
        let deadline = Instant::now() + delay;
        let cancel = CancellationToken::new();
        self.pending = Some(Pending {
            deadline,
            cancel: cancel.clone(),
        });
        ScheduledRetry { deadline, cancel }
    }

    /// Cancels the pending retry, if any. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a retry is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Deadline of the pending retry.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }
}

/// Handle to one armed retry, awaited by the connection driver.
#[derive(Debug)]
pub struct ScheduledRetry {
    deadline: Instant,
    cancel: CancellationToken,
}

impl ScheduledRetry {
    /// Waits for the deadline. Returns `false` if the retry was cancelled
    /// first.
    pub async fn wait(self) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep_until(self.deadline) => !self.cancel.is_cancelled(),
        }
    }

    /// Deadline of this retry.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
