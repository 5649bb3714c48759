//! EventHandler port - Interface for processing delivered domain events.
//!
//! A handler is a capability: it can process a `DomainEvent` and may fail.
//! Its identity is not part of the trait; it is assigned when the handler is
//! subscribed (see `SubscriptionRegistry`), so the same handler value can be
//! registered under several ids or types.

use async_trait::async_trait;
use std::future::Future;

use crate::domain::events::DomainEvent;
use crate::domain::foundation::DomainError;

/// Handler for processing domain events.
///
/// Implementations should be:
/// - **Idempotent** - Delivery is at-least-once; the same event id may arrive twice
/// - **Bounded** - Invocations past the configured deadline count as failures
/// - **Isolated** - Errors are recorded for this handler only
///
/// # Example
///
/// ```ignore
/// struct WelcomeMailer { /* ... */ }
///
/// #[async_trait]
/// impl EventHandler for WelcomeMailer {
///     async fn handle(&self, event: DomainEvent) -> Result<(), DomainError> {
///         let payload: UserCreated = event.payload_as()
///             .map_err(|e| DomainError::handler(e.to_string()))?;
///         self.send_welcome(&payload.email).await
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event.
    async fn handle(&self, event: DomainEvent) -> Result<(), DomainError>;
}

/// Adapter turning an async closure into an [`EventHandler`].
pub struct FnHandler<F>(F);

/// Wraps an async closure as a handler.
///
/// ```ignore
/// bus.subscribe("order.created", HandlerId::new("audit")?, Arc::new(handler_fn(|event| async move {
///     tracing::info!(event_id = %event.id(), "audited");
///     Ok(())
/// }))).await?;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DomainError>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DomainError>> + Send,
{
    async fn handle(&self, event: DomainEvent) -> Result<(), DomainError> {
        (self.0)(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_handler_object_safe(_: &dyn EventHandler) {}

    #[tokio::test]
    async fn handler_fn_invokes_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = handler_fn(move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        handler
            .handle(DomainEvent::test_fixture("test.event"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_fn_propagates_errors() {
        let handler = handler_fn(|_event| async { Err(DomainError::handler("nope")) });
        let result = handler.handle(DomainEvent::test_fixture("test.event")).await;
        assert!(result.is_err());
    }
}
