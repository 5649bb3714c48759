//! RetryLedger port - Bounded-lifetime record of handler failures.
//!
//! The ledger only records. It never redelivers; replaying a failed
//! (event, handler) pair is an operational action taken outside the bus.
//! Records expire after the ledger's TTL (one hour by default).

use async_trait::async_trait;

use crate::domain::events::RetryRecord;
use crate::domain::foundation::{EventId, HandlerId};

use super::StoreError;

/// Port for recording and inspecting failed handler invocations.
///
/// # Example
///
/// ```ignore
/// ledger.record(&RetryRecord::new(event_id, handler_id, err.to_string())).await?;
///
/// // Later, from an operator tool:
/// for record in ledger.list_for_event(&event_id).await? {
///     println!("{} failed: {}", record.handler_id, record.error);
/// }
/// ```
#[async_trait]
pub trait RetryLedger: Send + Sync {
    /// Writes the record under `retry:<eventId>:<handlerId>`, replacing any
    /// previous record for the same pair.
    async fn record(&self, record: &RetryRecord) -> Result<(), StoreError>;

    /// Returns the live record for an (event, handler) pair.
    async fn find(
        &self,
        event_id: &EventId,
        handler_id: &HandlerId,
    ) -> Result<Option<RetryRecord>, StoreError>;

    /// Returns every live record for an event, ordered by handler id.
    async fn list_for_event(&self, event_id: &EventId) -> Result<Vec<RetryRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn RetryLedger) {}
}
