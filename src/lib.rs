//! # monit-stream
//!
//! Real-time event stream client for the Monit patient monitoring backend.
//!
//! One persistent WebSocket connection receives vitals, alerts, agent logs
//! and system notices. Each frame is decoded, routed to the store that owns
//! its key, applied idempotently, and then handed to subscribers. The
//! connection survives network loss by retrying on a fixed delay until it
//! is shut down. Request/response commands (fetch, acknowledge, resolve,
//! chat) go over REST and reconcile with the streamed state.
//!
//! ## Architecture
//!
//! ```text
//! Backend (WebSocket)            Backend (REST)
//!     │                               │
//!     ├── Connection (stream/)        ├── HttpApi (api/)
//!     │     retry, epochs             │
//!     ├── decode → route (stream/)    ├── Alert/Patient/ChatService (service/)
//!     │                               │
//!     └──────────── Stores (store/) ──┘
//!                     │
//!              SubscriberRegistry (stream/)
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{MonitorClient, WsMonitorClient};
pub use config::ClientConfig;
pub use error::{ClientError, TransportError};
