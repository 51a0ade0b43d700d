//! Domain stores: one owned partition of application state per domain.
//!
//! Every store funnels its mutations through a single write lock, so
//! stream events and command responses for the same key are applied one
//! at a time. Presentation code reads snapshots; it never mutates a store
//! directly.

pub mod alert_store;
pub mod chat_store;
pub mod patient_store;
pub mod vitals_store;

use std::sync::Arc;

pub use alert_store::{AlertStore, AlertUpdate};
pub use chat_store::ChatStore;
pub use patient_store::PatientStore;
pub use vitals_store::VitalsStore;

use crate::domain::{ChatKey, ChatMessage, VitalsRecord};

/// Effect of applying one input to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new entry was created.
    Inserted,
    /// An existing entry changed.
    Updated,
    /// The input matched what was already held.
    Unchanged,
    /// The input was refused (e.g. a backward status transition).
    Rejected,
}

impl ApplyOutcome {
    /// Returns `true` if store state changed.
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

/// A mutation addressed to exactly one store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Append or merge a vitals sample.
    Vitals(VitalsRecord),
    /// Upsert an alert.
    Alert(AlertUpdate),
    /// Append a message to a chat partition.
    Chat {
        /// Target partition.
        key: ChatKey,
        /// Message to append.
        message: ChatMessage,
    },
}

impl StoreOp {
    /// Name of the target store, for diagnostics.
    #[must_use]
    pub const fn store_name(&self) -> &'static str {
        match self {
            Self::Vitals(_) => "vitals",
            Self::Alert(_) => "alerts",
            Self::Chat { .. } => "chat",
        }
    }
}

/// The four stores of one client session.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Vital-sign history.
    pub vitals: Arc<VitalsStore>,
    /// Alerts.
    pub alerts: Arc<AlertStore>,
    /// Chat transcripts.
    pub chat: Arc<ChatStore>,
    /// Patient roster.
    pub patients: Arc<PatientStore>,
}

impl Stores {
    /// Creates empty stores.
    #[must_use]
    pub fn new(vitals_history_limit: usize) -> Self {
        Self {
            vitals: Arc::new(VitalsStore::new(vitals_history_limit)),
            alerts: Arc::new(AlertStore::new()),
            chat: Arc::new(ChatStore::new()),
            patients: Arc::new(PatientStore::new()),
        }
    }

    /// Applies one operation to the store it addresses.
    pub async fn apply(&self, op: StoreOp) -> ApplyOutcome {
        match op {
            StoreOp::Vitals(record) => self.vitals.apply(record).await,
            StoreOp::Alert(update) => self.alerts.apply(update).await,
            StoreOp::Chat { key, message } => self.chat.apply(key, message).await,
        }
    }
}
