//! Stream transport seam and the WebSocket implementation.
//!
//! A [`Transport`] opens [`Session`]s; the connection state machine owns
//! the session it opened and is the only code that reads from or closes
//! it. Closing consumes the session, so a handle is released exactly once.

use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::ClientConfig;
use crate::error::TransportError;

/// Opens stream sessions.
pub trait Transport: Send + Sync + 'static {
    /// Session type produced by [`Transport::open`].
    type Session: Session;

    /// Opens a new session. Any failure, including a rejected handshake, is
    /// a [`TransportError`].
    fn open(&self) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}

/// One open duplex session.
pub trait Session: Send + 'static {
    /// Waits for the next inbound text frame.
    ///
    /// Returns `None` once the peer has closed the session.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String, TransportError>>> + Send;

    /// Closes the session and releases the handle.
    fn close(self) -> impl Future<Output = ()> + Send;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport built on `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    auth_token: Option<String>,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Creates a transport for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Creates a transport from the client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            auth_token: config.auth_token.clone(),
            connect_timeout: config.connect_timeout,
        }
    }

    /// Sends `Authorization: Bearer <token>` on the handshake.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Bounds the time a single open may take.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    type Session = WsSession;

    async fn open(&self) -> Result<WsSession, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Connect(format!("invalid auth token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url = %self.url, status = %response.status(), "websocket handshake complete");
        Ok(WsSession { stream })
    }
}

/// Open WebSocket session.
pub struct WsSession {
    stream: WsStream,
}

impl std::fmt::Debug for WsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession").finish_non_exhaustive()
    }
}

impl Session for WsSession {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!(len = bytes.len(), "discarding non-UTF-8 binary frame");
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "peer closed websocket");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            }
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "websocket close handshake failed");
        }
    }
}
