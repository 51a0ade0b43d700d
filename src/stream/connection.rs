//! Stream connection state machine.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──ok──▶ Open ──loss──▶ Reconnecting
//!                      ▲   │                              │
//!                      │   └─────────fail─────────────────┤
//!                      └──────────retry delay─────────────┘
//! any state ──disconnect──▶ Closing ──▶ Closed ──connect──▶ Connecting
//! ```
//!
//! A single driver task owns the transport session and runs the loop
//! above. Unexpected loss never terminates the connection; only
//! [`Connection::disconnect`] does. Every `connect` starts a new epoch and
//! every `disconnect` ends it; the driver commits a transition only while
//! its epoch is current, so an attempt that resolves after a disconnect
//! discards itself instead of resurrecting the connection.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::retry::{RetryTimer, ScheduledRetry};
use super::transport::{Session, Transport};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, never connected.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Receiving frames.
    Open,
    /// Lost unexpectedly; waiting for the retry delay.
    Reconnecting,
    /// Shutting down.
    Closing,
    /// Shut down by request.
    Closed,
}

impl ConnectionState {
    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Closed | Self::Reconnecting, Self::Connecting)
                | (Self::Connecting, Self::Open | Self::Reconnecting)
                | (Self::Open, Self::Reconnecting)
                | (
                    Self::Idle | Self::Connecting | Self::Open | Self::Reconnecting,
                    Self::Closing
                )
                | (Self::Closing, Self::Closed)
        )
    }

    /// Returns `true` for states reported to connectivity observers.
    #[must_use]
    pub const fn is_connectivity_change(self) -> bool {
        matches!(self, Self::Open | Self::Reconnecting | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback told about connectivity changes (entry to `Open`,
/// `Reconnecting` and `Closed`).
pub type ConnectivityObserver = Arc<dyn Fn(ConnectionState) + Send + Sync>;

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    epoch: u64,
    retry_count: u32,
    retry: RetryTimer,
    cancel: Option<CancellationToken>,
    /// Epoch of the driver task still running, if any.
    driver: Option<u64>,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Serialises announcements so observers see transitions in commit order.
    /// Re-entrant so an observer may call back into the connection.
    order: ReentrantMutex<()>,
    transitions: broadcast::Sender<ConnectionState>,
    observers: RwLock<Vec<ConnectivityObserver>>,
    /// Woken whenever a driver exits.
    driver_exit: Notify,
}

impl Shared {
    /// Commits `next` if `epoch` is still current and the move is legal.
    fn commit(&self, epoch: u64, next: ConnectionState) -> bool {
        let _order = self.order.lock();
        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || !inner.state.can_transition_to(next) {
                return false;
            }
            if inner.state == ConnectionState::Reconnecting {
                inner.retry.cancel();
            }
            if next == ConnectionState::Open {
                inner.retry_count = 0;
            }
            inner.state = next;
        }
        self.announce(next);
        true
    }

    /// Moves to `Reconnecting` and arms the retry in one step.
    fn begin_retry(&self, epoch: u64, delay: Duration) -> Option<(ScheduledRetry, u32)> {
        let _order = self.order.lock();
        let scheduled = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || !inner.state.can_transition_to(ConnectionState::Reconnecting)
            {
                return None;
            }
            inner.state = ConnectionState::Reconnecting;
            inner.retry_count = inner.retry_count.saturating_add(1);
            let retry = inner.retry.arm(delay);
            (retry, inner.retry_count)
        };
        self.announce(ConnectionState::Reconnecting);
        Some(scheduled)
    }

    fn announce(&self, state: ConnectionState) {
        tracing::info!(state = %state, "stream connection state changed");
        let _ = self.transitions.send(state);
        if state.is_connectivity_change() {
            let observers: Vec<ConnectivityObserver> = self.observers.read().clone();
            for observer in observers {
                if catch_unwind(AssertUnwindSafe(|| observer(state))).is_err() {
                    tracing::error!(state = %state, "connectivity observer panicked");
                }
            }
        }
    }

    /// Moves `Closing` to `Closed` and announces it.
    fn finish_close(&self) {
        let _order = self.order.lock();
        {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Closing {
                return;
            }
            inner.state = ConnectionState::Closed;
        }
        self.announce(ConnectionState::Closed);
    }

    /// Called once by every driver on its way out, however it ends.
    fn driver_exited(&self, epoch: u64) {
        {
            let _order = self.order.lock();
            let mut inner = self.inner.lock();
            if inner.driver == Some(epoch) {
                inner.driver = None;
            }
        }
        self.finish_close();
        self.driver_exit.notify_waiters();
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().epoch == epoch
    }
}

/// Why a session stopped.
enum SessionEnd {
    Lost,
    Cancelled,
}

/// Owns the transport and the single live session of a client.
///
/// Inbound frames are forwarded, in arrival order, to the channel given
/// at construction.
pub struct Connection<T: Transport> {
    transport: Arc<T>,
    shared: Arc<Shared>,
    frames: mpsc::Sender<String>,
    retry_delay: Duration,
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Connection")
            .field("state", &inner.state)
            .field("epoch", &inner.epoch)
            .field("retry_count", &inner.retry_count)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Connection<T> {
    /// Creates an idle connection.
    ///
    /// `retry_delay` is the fixed wait between a loss and the next attempt.
    #[must_use]
    pub fn new(transport: T, frames: mpsc::Sender<String>, retry_delay: Duration) -> Self {
        let (transitions, _) = broadcast::channel(64);
        Self {
            transport: Arc::new(transport),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ConnectionState::Idle,
                    epoch: 0,
                    retry_count: 0,
                    retry: RetryTimer::new(),
                    cancel: None,
                    driver: None,
                }),
                order: ReentrantMutex::new(()),
                transitions,
                observers: RwLock::new(Vec::new()),
                driver_exit: Notify::new(),
            }),
            frames,
            retry_delay,
        }
    }

    /// Starts connecting from `Idle` or `Closed`. Has no effect in any
    /// other state. Must be called within a Tokio runtime.
    ///
    /// Failures are never returned; they move the connection to
    /// `Reconnecting` and are retried.
    pub fn connect(&self) {
        let _order = self.shared.order.lock();
        {
            let mut inner = self.shared.inner.lock();
            if !matches!(inner.state, ConnectionState::Idle | ConnectionState::Closed) {
                tracing::debug!(state = %inner.state, "connect ignored");
                return;
            }
            inner.epoch = inner.epoch.wrapping_add(1);
            inner.retry_count = 0;
            inner.state = ConnectionState::Connecting;

            let cancel = CancellationToken::new();
            inner.cancel = Some(cancel.clone());
            let driver = Driver {
                transport: Arc::clone(&self.transport),
                shared: Arc::clone(&self.shared),
                frames: self.frames.clone(),
                retry_delay: self.retry_delay,
                epoch: inner.epoch,
                cancel,
            };
            inner.driver = Some(inner.epoch);
            tokio::spawn(driver.run());
        }
        self.shared.announce(ConnectionState::Connecting);
    }

    /// Shuts the connection down from any state.
    ///
    /// Cancels a pending retry, cancels an in-flight open, closes the live
    /// session, and returns once the connection is `Closed`. Calling it on
    /// an idle or already closed connection is harmless. Dropping the
    /// returned future early does not leave the connection stuck: the
    /// driver completes the close on its own, and a later call waits for it.
    pub async fn disconnect(&self) {
        {
            let _order = self.shared.order.lock();
            let driver_running = {
                let mut inner = self.shared.inner.lock();
                match inner.state {
                    ConnectionState::Closed => return,
                    ConnectionState::Closing => None,
                    _ => {
                        inner.epoch = inner.epoch.wrapping_add(1);
                        inner.retry.cancel();
                        if let Some(cancel) = inner.cancel.take() {
                            cancel.cancel();
                        }
                        inner.state = ConnectionState::Closing;
                        Some(inner.driver.is_some())
                    }
                }
            };
            if let Some(driver_running) = driver_running {
                self.shared.announce(ConnectionState::Closing);
                if !driver_running {
                    self.shared.finish_close();
                }
            }
        }

        loop {
            let exited = self.shared.driver_exit.notified();
            tokio::pin!(exited);
            exited.as_mut().enable();
            if self.state() != ConnectionState::Closing {
                return;
            }
            exited.await;
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Returns `true` while frames are being received.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Consecutive retries since the last successful open.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.inner.lock().retry_count
    }

    /// Returns `true` if a retry is scheduled.
    #[must_use]
    pub fn retry_pending(&self) -> bool {
        self.shared.inner.lock().retry.is_pending()
    }

    /// Deadline of the scheduled retry.
    #[must_use]
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.shared.inner.lock().retry.deadline()
    }

    /// Receives every state transition from now on.
    #[must_use]
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.transitions.subscribe()
    }

    /// Registers a connectivity observer. Observers run synchronously on
    /// the task committing the transition and must not block.
    pub fn on_connectivity<F>(&self, observer: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.shared.observers.write().push(Arc::new(observer));
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.retry.cancel();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
    }
}

/// Reports a driver's exit, including when its task is aborted or panics.
struct DriverExit {
    shared: Arc<Shared>,
    epoch: u64,
}

impl Drop for DriverExit {
    fn drop(&mut self) {
        self.shared.driver_exited(self.epoch);
    }
}

/// Background task running one epoch of the connection.
struct Driver<T: Transport> {
    transport: Arc<T>,
    shared: Arc<Shared>,
    frames: mpsc::Sender<String>,
    retry_delay: Duration,
    epoch: u64,
    cancel: CancellationToken,
}

impl<T: Transport> Driver<T> {
    async fn run(self) {
        let _exit = DriverExit {
            shared: Arc::clone(&self.shared),
            epoch: self.epoch,
        };
        loop {
            let attempt = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.transport.open() => result,
            };

            match attempt {
                Ok(session) => {
                    if !self.shared.commit(self.epoch, ConnectionState::Open) {
                        tracing::debug!(epoch = self.epoch, "discarding session opened after disconnect");
                        session.close().await;
                        break;
                    }
                    match self.pump(session).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Lost => {
                            tracing::warn!("stream connection lost");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stream connect attempt failed");
                }
            }

            let Some((retry, attempt_no)) = self.shared.begin_retry(self.epoch, self.retry_delay)
            else {
                break;
            };
            tracing::info!(
                attempt = attempt_no,
                delay_ms = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX),
                "scheduling stream reconnect"
            );
            if !retry.wait().await {
                break;
            }
            if !self.shared.commit(self.epoch, ConnectionState::Connecting) {
                break;
            }
        }
        tracing::debug!(epoch = self.epoch, "stream driver stopped");
    }

    /// Forwards frames until the session ends or the epoch is cancelled.
    /// The session is closed exactly once, here.
    async fn pump(&self, mut session: T::Session) -> SessionEnd {
        let end = loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break SessionEnd::Cancelled,
                next = session.recv() => next,
            };
            match next {
                Some(Ok(frame)) => {
                    let delivered = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break SessionEnd::Cancelled,
                        sent = self.frames.send(frame) => sent.is_ok(),
                    };
                    if !delivered {
                        tracing::debug!("frame consumer gone; stopping stream");
                        break SessionEnd::Cancelled;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "stream transport error");
                    break SessionEnd::Lost;
                }
                None => break SessionEnd::Lost,
            }
        };
        session.close().await;
        if matches!(end, SessionEnd::Lost) && !self.shared.is_current(self.epoch) {
            return SessionEnd::Cancelled;
        }
        end
    }
}
