//! Subscription registry - event type to handler set, in-process.
//!
//! The registry is an owned component handed to the dispatcher, not a
//! global. Reads return snapshots: a dispatch that is iterating handlers
//! never observes a subscribe or unsubscribe that happens concurrently.
//!
//! Nothing here is persisted; subscriptions are rebuilt on restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::HandlerId;
use crate::ports::EventHandler;

/// A handler bound to the identity it was registered under.
#[derive(Clone)]
pub struct Subscription {
    pub handler_id: HandlerId,
    pub handler: Arc<dyn EventHandler>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handler_id", &self.handler_id)
            .finish_non_exhaustive()
    }
}

/// Result of [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscribed {
    /// First handler for this type; the type entry was created.
    NewType,
    /// Added alongside existing handlers of the type.
    Added,
    /// This handler id was already subscribed to the type; nothing changed.
    AlreadyPresent,
}

/// Result of [`SubscriptionRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsubscribed {
    /// Last handler removed; the type entry was dropped.
    TypeRemoved,
    /// Removed, other handlers remain for the type.
    Removed,
    /// Handler id was not subscribed to the type.
    NotFound,
}

/// Maps event type to the set of handlers subscribed to it.
///
/// Handlers within a type are keyed by [`HandlerId`]; no ordering is kept
/// among handlers of the same type.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: RwLock<HashMap<String, HashMap<HandlerId, Arc<dyn EventHandler>>>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler to the set for `event_type`. Idempotent per handler id.
    pub fn subscribe(
        &self,
        event_type: &str,
        handler_id: HandlerId,
        handler: Arc<dyn EventHandler>,
    ) -> Subscribed {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let is_new_type = !handlers.contains_key(event_type);
        let set = handlers.entry(event_type.to_string()).or_default();

        if set.contains_key(&handler_id) {
            return Subscribed::AlreadyPresent;
        }
        set.insert(handler_id, handler);

        if is_new_type {
            Subscribed::NewType
        } else {
            Subscribed::Added
        }
    }

    /// Removes a handler from `event_type`, dropping the type entry when its
    /// set becomes empty.
    pub fn unsubscribe(&self, event_type: &str, handler_id: &HandlerId) -> Unsubscribed {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(set) = handlers.get_mut(event_type) else {
            return Unsubscribed::NotFound;
        };
        if set.remove(handler_id).is_none() {
            return Unsubscribed::NotFound;
        }
        if set.is_empty() {
            handlers.remove(event_type);
            Unsubscribed::TypeRemoved
        } else {
            Unsubscribed::Removed
        }
    }

    /// Snapshot of the handlers currently subscribed to `event_type`.
    pub fn handlers_for(&self, event_type: &str) -> Vec<Subscription> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .get(event_type)
            .map(|set| {
                set.iter()
                    .map(|(handler_id, handler)| Subscription {
                        handler_id: handler_id.clone(),
                        handler: Arc::clone(handler),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Event types with at least one handler, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<String> = handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of distinct handler ids across all types.
    pub fn handler_count(&self) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers
            .values()
            .flat_map(|set| set.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DomainEvent;
    use crate::domain::foundation::DomainError;
    use async_trait::async_trait;

    struct NoopHandler;

    #[async_trait]
    impl EventHandler for NoopHandler {
        async fn handle(&self, _: DomainEvent) -> Result<(), DomainError> {
            Ok(())
        }
    }

    fn id(s: &str) -> HandlerId {
        HandlerId::new(s).unwrap()
    }

    #[test]
    fn first_subscription_creates_type() {
        let registry = SubscriptionRegistry::new();
        let outcome = registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));

        assert_eq!(outcome, Subscribed::NewType);
        assert_eq!(registry.event_types(), vec!["user.created".to_string()]);
    }

    #[test]
    fn subscribe_is_idempotent_per_handler_id() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));
        let outcome = registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));

        assert_eq!(outcome, Subscribed::AlreadyPresent);
        assert_eq!(registry.handlers_for("user.created").len(), 1);
    }

    #[test]
    fn multiple_handlers_share_a_type() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));
        let outcome = registry.subscribe("user.created", id("b"), Arc::new(NoopHandler));

        assert_eq!(outcome, Subscribed::Added);
        assert_eq!(registry.handlers_for("user.created").len(), 2);
    }

    #[test]
    fn handlers_for_unknown_type_is_empty() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.handlers_for("nothing").is_empty());
    }

    #[test]
    fn removing_last_handler_drops_type() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));
        registry.subscribe("user.created", id("b"), Arc::new(NoopHandler));

        assert_eq!(registry.unsubscribe("user.created", &id("a")), Unsubscribed::Removed);
        assert_eq!(
            registry.unsubscribe("user.created", &id("b")),
            Unsubscribed::TypeRemoved
        );
        assert!(registry.handlers_for("user.created").is_empty());
        assert!(registry.event_types().is_empty());
    }

    #[test]
    fn unsubscribing_unknown_handler_is_not_found() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));

        assert_eq!(registry.unsubscribe("user.created", &id("z")), Unsubscribed::NotFound);
        assert_eq!(registry.unsubscribe("other", &id("a")), Unsubscribed::NotFound);
    }

    #[test]
    fn handler_count_counts_distinct_ids() {
        let registry = SubscriptionRegistry::new();
        let shared: Arc<dyn EventHandler> = Arc::new(NoopHandler);
        registry.subscribe("a.created", id("audit"), shared.clone());
        registry.subscribe("b.created", id("audit"), shared);
        registry.subscribe("b.created", id("mailer"), Arc::new(NoopHandler));

        assert_eq!(registry.handler_count(), 2);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("user.created", id("a"), Arc::new(NoopHandler));

        let snapshot = registry.handlers_for("user.created");
        registry.subscribe("user.created", id("b"), Arc::new(NoopHandler));
        registry.unsubscribe("user.created", &id("a"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].handler_id, id("a"));
    }

    #[test]
    fn concurrent_readers_never_see_partial_sets() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let handler_id = id(&format!("h{}", i % 4));
                    registry.subscribe("t", handler_id.clone(), Arc::new(NoopHandler));
                    registry.unsubscribe("t", &handler_id);
                }
            })
        };

        for _ in 0..500 {
            let snapshot = registry.handlers_for("t");
            assert!(snapshot.len() <= 4);
        }
        writer.join().unwrap();
    }
}
