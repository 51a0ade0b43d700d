//! REST implementation of [`MonitorApi`] on `reqwest`.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use super::MonitorApi;
use super::dto::{AlertsResponse, ChatRequest, ChatResponse, ErrorBody, StatusResponse};
use crate::config::ClientConfig;
use crate::domain::{AlertId, Patient, PatientId, RiskScore, VitalsRecord};
use crate::error::ClientError;

/// HTTP client for the monitoring backend.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpApi {
    /// Creates a client for `base_url` (e.g. `http://localhost:8000`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the URL cannot be a base URL, or
    /// [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("invalid API base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "API base URL '{base_url}' cannot be a base"
            )));
        }
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url,
            auth_token: None,
        })
    }

    /// Creates a client from the client configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpApi::new`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = Self::new(&config.api_base_url, config.request_timeout)?;
        Ok(match &config.auth_token {
            Some(token) => api.with_auth_token(token.clone()),
            None => api,
        })
    }

    /// Sends `Authorization: Bearer <token>` on every request.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/api/{segments...}`. A trailing empty segment yields a
    /// trailing slash.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Internal("API base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        tracing::debug!(%url, "GET");
        self.send(self.request(Method::GET, url)).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        tracing::debug!(%url, "POST");
        self.send(self.request(Method::POST, url)).await
    }
}

/// Maps a non-2xx response to [`ClientError::Api`].
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });
    tracing::debug!(status = status.as_u16(), %message, "backend rejected request");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

impl MonitorApi for HttpApi {
    async fn list_patients(&self) -> Result<Vec<Patient>, ClientError> {
        self.get(self.url(&["patients", ""])?).await
    }

    async fn get_patient(&self, patient_id: &PatientId) -> Result<Patient, ClientError> {
        self.get(self.url(&["patients", patient_id.as_str()])?).await
    }

    async fn patient_vitals(
        &self,
        patient_id: &PatientId,
        limit: usize,
    ) -> Result<Vec<VitalsRecord>, ClientError> {
        let mut url = self.url(&["patients", patient_id.as_str(), "vitals"])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        self.get(url).await
    }

    async fn risk_score(&self, patient_id: &PatientId) -> Result<RiskScore, ClientError> {
        self.get(self.url(&["patients", patient_id.as_str(), "risk-score"])?)
            .await
    }

    async fn list_alerts(
        &self,
        patient_id: Option<&PatientId>,
    ) -> Result<AlertsResponse, ClientError> {
        let mut url = self.url(&["alerts", ""])?;
        if let Some(patient_id) = patient_id {
            url.query_pairs_mut()
                .append_pair("patient_id", patient_id.as_str());
        }
        self.get(url).await
    }

    async fn acknowledge_alert(&self, alert_id: &AlertId) -> Result<StatusResponse, ClientError> {
        self.post(self.url(&["alerts", alert_id.as_str(), "acknowledge"])?)
            .await
    }

    async fn resolve_alert(&self, alert_id: &AlertId) -> Result<StatusResponse, ClientError> {
        self.post(self.url(&["alerts", alert_id.as_str(), "resolve"])?)
            .await
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let url = self.url(&["chat", "text"])?;
        tracing::debug!(%url, "POST");
        self.send(self.request(Method::POST, url).json(request)).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        let Ok(api) = HttpApi::new(base, Duration::from_secs(1)) else {
            panic!("valid base URL");
        };
        api
    }

    #[test]
    fn builds_paths_under_api() {
        let api = api("http://localhost:8000");
        let Ok(url) = api.url(&["patients", ""]) else {
            panic!("url");
        };
        assert_eq!(url.as_str(), "http://localhost:8000/api/patients/");

        let Ok(url) = api.url(&["alerts", "A 1", "resolve"]) else {
            panic!("url");
        };
        assert_eq!(url.as_str(), "http://localhost:8000/api/alerts/A%201/resolve");
    }

    #[test]
    fn keeps_base_path_prefix() {
        let api = api("https://monit.example.org/backend/");
        let Ok(url) = api.url(&["chat", "text"]) else {
            panic!("url");
        };
        assert_eq!(url.as_str(), "https://monit.example.org/backend/api/chat/text");
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(
            HttpApi::new("not a url", Duration::from_secs(1)),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            HttpApi::new("mailto:ops@example.org", Duration::from_secs(1)),
            Err(ClientError::Config(_))
        ));
    }
}
