//! Chat transcripts partitioned by patient.
//!
//! Partitions are append-only and ordered by arrival. A message id already
//! present in a partition is a redelivery and is ignored.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::ApplyOutcome;
use crate::domain::{ChatKey, ChatMessage, Delivery, MessageId};

#[derive(Debug, Default)]
struct Partition {
    messages: Vec<ChatMessage>,
    seen: HashSet<MessageId>,
}

/// Store of chat partitions keyed by [`ChatKey`].
#[derive(Debug, Default)]
pub struct ChatStore {
    partitions: RwLock<HashMap<ChatKey, Partition>>,
}

impl ChatStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` to the partition `key`.
    pub async fn apply(&self, key: ChatKey, message: ChatMessage) -> ApplyOutcome {
        let mut map = self.partitions.write().await;
        let partition = map.entry(key).or_default();
        if !partition.seen.insert(message.message_id.clone()) {
            tracing::debug!(message_id = %message.message_id, "duplicate chat message ignored");
            return ApplyOutcome::Unchanged;
        }
        partition.messages.push(message);
        ApplyOutcome::Inserted
    }

    /// Updates the delivery state of a locally composed message.
    ///
    /// Returns `false` if the message is not in the partition.
    pub async fn set_delivery(&self, key: &ChatKey, message_id: &MessageId, delivery: Delivery) -> bool {
        let mut map = self.partitions.write().await;
        let Some(message) = map
            .get_mut(key)
            .and_then(|p| p.messages.iter_mut().find(|m| m.message_id == *message_id))
        else {
            return false;
        };
        message.delivery = delivery;
        true
    }

    /// Returns the messages of one partition in arrival order.
    pub async fn messages(&self, key: &ChatKey) -> Vec<ChatMessage> {
        self.partitions
            .read()
            .await
            .get(key)
            .map(|p| p.messages.clone())
            .unwrap_or_default()
    }

    /// Returns the keys of every non-empty partition.
    pub async fn keys(&self) -> Vec<ChatKey> {
        let map = self.partitions.read().await;
        let mut keys: Vec<ChatKey> = map
            .iter()
            .filter(|(_, p)| !p.messages.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}
