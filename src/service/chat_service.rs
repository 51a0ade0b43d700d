//! Chat commands reconciled into the chat store.

use std::sync::Arc;

use chrono::Utc;

use crate::api::{ChatRequest, MonitorApi};
use crate::domain::chat::default_language;
use crate::domain::{ChatKey, ChatMessage, ChatRole, Delivery, MessageId, PatientId};
use crate::error::ClientError;
use crate::store::ChatStore;
use crate::stream::router::DEFAULT_AGENT;

/// Author id of messages composed on this client.
pub const LOCAL_USER: &str = "current-user";

/// Sends chat questions and appends both sides of the exchange to the
/// partition of the patient (or the general partition).
#[derive(Debug)]
pub struct ChatService<A> {
    api: Arc<A>,
    store: Arc<ChatStore>,
}

impl<A> Clone for ChatService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
        }
    }
}

impl<A: MonitorApi> ChatService<A> {
    /// Creates a service writing into `store`.
    #[must_use]
    pub fn new(api: Arc<A>, store: Arc<ChatStore>) -> Self {
        Self { api, store }
    }

    /// Sends `text` to the agents.
    ///
    /// The question is appended immediately as [`Delivery::Pending`]. On
    /// success it is marked confirmed and the agent reply is appended and
    /// returned; on failure it is marked [`Delivery::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] for blank text, or the
    /// [`ClientError`] of the failed request.
    pub async fn send_message(
        &self,
        patient_id: Option<PatientId>,
        text: &str,
        language: Option<&str>,
    ) -> Result<ChatMessage, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::InvalidRequest("chat message is empty".to_string()));
        }
        let key = ChatKey::for_patient(patient_id.as_ref());
        let language = language.map_or_else(default_language, str::to_string);

        let question = ChatMessage {
            message_id: MessageId::local(),
            patient_id: patient_id.clone(),
            user_id: LOCAL_USER.to_string(),
            role: ChatRole::User,
            content: text.to_string(),
            audio_url: None,
            language: language.clone(),
            metadata: None,
            timestamp: Utc::now(),
            delivery: Delivery::Pending,
        };
        let question_id = question.message_id.clone();
        self.store.apply(key.clone(), question).await;

        let request = ChatRequest {
            patient_id: patient_id.clone(),
            message: text.to_string(),
            language: Some(language.clone()),
        };
        match self.api.send_chat(&request).await {
            Ok(response) => {
                self.store
                    .set_delivery(&key, &question_id, Delivery::Confirmed)
                    .await;
                let reply = ChatMessage {
                    message_id: response.message_id,
                    patient_id,
                    user_id: DEFAULT_AGENT.to_string(),
                    role: ChatRole::Agent,
                    content: response.content,
                    audio_url: response.audio_url,
                    language,
                    metadata: None,
                    timestamp: response.timestamp,
                    delivery: Delivery::Confirmed,
                };
                self.store.apply(key, reply.clone()).await;
                Ok(reply)
            }
            Err(e) => {
                self.store
                    .set_delivery(&key, &question_id, Delivery::Failed)
                    .await;
                tracing::warn!(chat = %key, error = %e, "chat message failed");
                Err(e)
            }
        }
    }

    /// Messages of one partition in arrival order.
    pub async fn messages(&self, key: &ChatKey) -> Vec<ChatMessage> {
        self.store.messages(key).await
    }
}
