//! Real-time event stream: transport, connection state machine, decoding,
//! routing, dispatch and subscriber fan-out.
//!
//! ```text
//! Transport ─▶ Connection ─(mpsc, ordered)─▶ Dispatcher
//!                                              ├─ decode
//!                                              ├─ route ─▶ Stores::apply
//!                                              └─ SubscriberRegistry::notify
//! ```

pub mod connection;
pub mod decoder;
pub mod dispatcher;
pub mod retry;
pub mod router;
pub mod subscription;
pub mod transport;

pub use connection::{Connection, ConnectionState, ConnectivityObserver};
pub use decoder::{DecodeError, decode};
pub use dispatcher::{Dispatcher, FrameOutcome};
pub use retry::{RetryTimer, ScheduledRetry};
pub use router::route;
pub use subscription::{Handler, SubscriberRegistry, SubscriptionId};
pub use transport::{Session, Transport, WsSession, WsTransport};
