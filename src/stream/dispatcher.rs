//! Ordered event pump: decode, route, apply, notify.
//!
//! Frames are processed one at a time in arrival order; an event is fully
//! applied to every store it touches before its subscribers run and
//! before the next frame is decoded.

use tokio::sync::mpsc;

use super::decoder::decode;
use super::router::route;
use super::subscription::SubscriberRegistry;
use crate::domain::EventEnvelope;
use crate::store::Stores;

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Decoded and dispatched; at least one store changed or the event has
    /// no store target. Subscribers were notified.
    Applied,
    /// Decoded, but every store already held it (or rejected it).
    /// Subscribers were not notified.
    Ignored,
    /// Could not be decoded and was discarded.
    Discarded,
}

/// Applies decoded stream events to the stores and notifies subscribers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    stores: Stores,
    registry: SubscriberRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher over the given stores and registry.
    #[must_use]
    pub fn new(stores: Stores, registry: SubscriberRegistry) -> Self {
        Self { stores, registry }
    }

    /// Decodes and dispatches one raw frame. Decode failures are logged and
    /// the frame is dropped.
    pub async fn handle_frame(&self, frame: &str) -> FrameOutcome {
        match decode(frame) {
            Ok(envelope) => self.dispatch(&envelope).await,
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "discarding undecodable frame");
                FrameOutcome::Discarded
            }
        }
    }

    /// Applies one envelope to its stores, then notifies subscribers.
    pub async fn dispatch(&self, envelope: &EventEnvelope) -> FrameOutcome {
        let ops = route(envelope);
        let targeted = !ops.is_empty();

        let mut changed = false;
        for op in ops {
            let store = op.store_name();
            let outcome = self.stores.apply(op).await;
            tracing::debug!(kind = %envelope.kind(), store, ?outcome, "applied stream event");
            changed |= outcome.is_change();
        }

        if targeted && !changed {
            return FrameOutcome::Ignored;
        }
        let failures = self.registry.notify(envelope);
        if failures > 0 {
            tracing::debug!(kind = %envelope.kind(), failures, "subscribers reported failures");
        }
        FrameOutcome::Applied
    }

    /// Drains `frames` until the channel closes.
    pub async fn run(self, mut frames: mpsc::Receiver<String>) {
        while let Some(frame) = frames.recv().await {
            self.handle_frame(&frame).await;
        }
        tracing::debug!("frame channel closed; dispatcher stopped");
    }
}
