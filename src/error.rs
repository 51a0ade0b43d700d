//! Client error types.
//!
//! [`ClientError`] is what callers of outbound commands see. Transport
//! faults are represented by [`TransportError`]; the connection state
//! machine recovers from them locally and only logs them, so they never
//! reach the presentation layer as errors.

use std::time::Duration;

/// Fault raised while opening or reading the stream transport.
///
/// Every variant is recovered by the connection's retry loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The endpoint could not be reached or the handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The endpoint did not complete the handshake in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The peer refused the session.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The session broke while reading frames.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Error reported to callers of client commands and configuration loading.
///
/// # Categories
///
/// | Variant          | Origin                                 |
/// |------------------|----------------------------------------|
/// | `Http`           | request could not be sent or decoded   |
/// | `Api`            | backend answered with a non-2xx status |
/// | `InvalidRequest` | rejected locally before sending        |
/// | `Config`         | invalid configuration value            |
/// | `Internal`       | unexpected client-side failure         |
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Request failed before a response was received, or the response body
    /// could not be decoded.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected the command.
    #[error("backend returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Command arguments were rejected before any request was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration value is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal client error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Returns the HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` when retrying the same command may succeed.
    ///
    /// Timeouts, connection failures and 5xx answers are transient;
    /// validation and 4xx answers are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::InvalidRequest(_) | Self::Config(_) | Self::Internal(_) => false,
        }
    }
}
