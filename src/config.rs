//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key is prefixed with `MONIT_`
//! except `LOG_FORMAT`.

use std::time::Duration;

use crate::error::ClientError;

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Stream endpoint, `ws://` or `wss://`.
    pub ws_url: String,

    /// Base URL of the request/response API (e.g. `http://localhost:8000`).
    pub api_base_url: String,

    /// Bearer token sent on the stream handshake and on every request.
    pub auth_token: Option<String>,

    /// Fixed delay between an unexpected loss and the next connect attempt.
    pub reconnect_delay: Duration,

    /// Upper bound for a single transport open.
    pub connect_timeout: Duration,

    /// Upper bound for a single outbound command.
    pub request_timeout: Duration,

    /// Capacity of the ordered frame channel feeding the dispatcher.
    pub frame_buffer: usize,

    /// Maximum vitals samples retained per patient.
    pub vitals_history_limit: usize,

    /// Emit JSON log lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8000/ws".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            auth_token: None,
            reconnect_delay: Duration::from_millis(3_000),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            frame_buffer: 10_000,
            vitals_history_limit: 100,
            log_json: false,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the [`Default`] values when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if a numeric variable is set but
    /// does not parse, or if the resulting configuration fails
    /// [`ClientConfig::validate`].
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let ws_url = std::env::var("MONIT_WS_URL").unwrap_or(defaults.ws_url);
        let api_base_url = std::env::var("MONIT_API_BASE_URL").unwrap_or(defaults.api_base_url);
        let auth_token = std::env::var("MONIT_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let reconnect_delay = Duration::from_millis(parse_env("MONIT_RECONNECT_DELAY_MS", 3_000)?);
        let connect_timeout = Duration::from_secs(parse_env("MONIT_CONNECT_TIMEOUT_SECS", 10)?);
        let request_timeout = Duration::from_secs(parse_env("MONIT_REQUEST_TIMEOUT_SECS", 10)?);
        let frame_buffer = parse_env("MONIT_FRAME_BUFFER", defaults.frame_buffer)?;
        let vitals_history_limit =
            parse_env("MONIT_VITALS_HISTORY_LIMIT", defaults.vitals_history_limit)?;

        let log_json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = Self {
            ws_url,
            api_base_url,
            auth_token,
            reconnect_delay,
            connect_timeout,
            request_timeout,
            frame_buffer,
            vitals_history_limit,
            log_json,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks URL schemes and capacity values.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "MONIT_WS_URL must use ws:// or wss://, got `{}`",
                self.ws_url
            )));
        }
        if reqwest::Url::parse(&self.api_base_url)
            .map(|u| !matches!(u.scheme(), "http" | "https"))
            .unwrap_or(true)
        {
            return Err(ClientError::Config(format!(
                "MONIT_API_BASE_URL must be an http(s) URL, got `{}`",
                self.api_base_url
            )));
        }
        if self.reconnect_delay.is_zero() {
            return Err(ClientError::Config(
                "MONIT_RECONNECT_DELAY_MS must be greater than zero".to_string(),
            ));
        }
        if self.frame_buffer == 0 {
            return Err(ClientError::Config(
                "MONIT_FRAME_BUFFER must be greater than zero".to_string(),
            ));
        }
        if self.vitals_history_limit == 0 {
            return Err(ClientError::Config(
                "MONIT_VITALS_HISTORY_LIMIT must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses an environment variable as `T`, returning `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, std::env::var(key).ok(), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim()
        .parse()
        .map_err(|e| ClientError::Config(format!("{key}=`{raw}` is invalid: {e}")))
}
