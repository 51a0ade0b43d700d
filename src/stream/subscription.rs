//! Subscriber registry.
//!
//! Callbacks are registered against one event kind, or against every kind
//! (wildcard), and are invoked synchronously in registration order after
//! the stores have applied the event. A callback that returns an error or
//! panics is logged and skipped; the rest still run.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::domain::{EventEnvelope, EventKind};

/// Subscriber callback.
pub type Handler = Arc<dyn Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindFilter {
    Only(EventKind),
    All,
}

impl KindFilter {
    fn matches(self, kind: EventKind) -> bool {
        match self {
            Self::Only(k) => k == kind,
            Self::All => true,
        }
    }
}

struct Entry {
    id: SubscriptionId,
    filter: KindFilter,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
}

/// Ordered registry of subscriber callbacks. Clones share the registry.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(KindFilter::Only(kind), Arc::new(handler))
    }

    /// Registers `handler` for every event kind.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(KindFilter::All, Arc::new(handler))
    }

    fn insert(&self, filter: KindFilter, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.entries.write().push(Entry {
            id,
            filter,
            handler,
        });
        id
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns `true` if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every callback matching the event's kind, in registration
    /// order. Returns the number of callbacks that failed.
    ///
    /// The matching handlers are snapshotted first, so a callback may
    /// subscribe or unsubscribe without deadlocking; the change applies
    /// from the next event.
    pub fn notify(&self, envelope: &EventEnvelope) -> usize {
        let kind = envelope.kind();
        let handlers: Vec<(SubscriptionId, Handler)> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|e| e.filter.matches(kind))
            .map(|e| (e.id, Arc::clone(&e.handler)))
            .collect();

        let mut failures = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(subscription = id.0, kind = %kind, error = %e, "subscriber failed");
                }
                Err(_) => {
                    failures += 1;
                    tracing::error!(subscription = id.0, kind = %kind, "subscriber panicked");
                }
            }
        }
        failures
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    fn system_event() -> EventEnvelope {
        EventEnvelope {
            timestamp: Utc::now(),
            payload: crate::domain::EventPayload::System(serde_json::json!({"message": "hi"})),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_| {
            log.lock().push(name);
            Ok(())
        }
    }

    #[test]
    fn invokes_in_registration_order_including_wildcards() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe(EventKind::System, recorder(&log, "first"));
        registry.subscribe_all(recorder(&log, "wildcard"));
        registry.subscribe(EventKind::Alert, recorder(&log, "alerts-only"));
        registry.subscribe(EventKind::System, recorder(&log, "last"));

        assert_eq!(registry.notify(&system_event()), 0);
        assert_eq!(*log.lock(), vec!["first", "wildcard", "last"]);
    }

    #[test]
    fn failing_and_panicking_callbacks_are_isolated() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe(EventKind::System, |_| Err(anyhow::anyhow!("render failed")));
        registry.subscribe(EventKind::System, |_| panic!("subscriber bug"));
        registry.subscribe(EventKind::System, recorder(&log, "survivor"));

        assert_eq!(registry.notify(&system_event()), 2);
        assert_eq!(*log.lock(), vec!["survivor"]);
    }

    #[test]
    fn unsubscribe_removes_callback() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = registry.subscribe(EventKind::System, recorder(&log, "gone"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.notify(&system_event());
        assert!(log.lock().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn callback_may_subscribe_during_notify() {
        let registry = SubscriberRegistry::new();
        let inner = registry.clone();
        registry.subscribe(EventKind::System, move |_| {
            inner.subscribe_all(|_| Ok(()));
            Ok(())
        });
        registry.notify(&system_event());
        assert_eq!(registry.len(), 2);
    }
}
