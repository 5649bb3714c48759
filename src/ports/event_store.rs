//! EventStore port - Durable storage for published events.
//!
//! The store keeps one authoritative copy of each event (the primary record
//! keyed by id) plus three views over it:
//!
//! | View | Key | Order |
//! |------|-----|-------|
//! | Per-source stream | `stream:<source>` | append order |
//! | Type index | `events:type:<type>` | publish time |
//! | Correlation index | `events:correlation:<id>` | publish time |
//!
//! The primary record and the stream append are the durability guarantee.
//! The two indexes are eventually-consistent secondary views: a failed index
//! write is logged and does not fail the publish.

use async_trait::async_trait;
use tracing::{error, warn};

use crate::domain::events::DomainEvent;
use crate::domain::foundation::{EventId, Timestamp};

/// Errors raised by event store and retry ledger adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or command failed
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Event could not be serialized for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored bytes could not be decoded back into a record
    #[error("Corrupt record at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Port for durable event storage and replay.
///
/// Adapters implement the four independent write primitives and the reads;
/// [`EventStore::persist`] combines the writes with the best-effort policy.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Writes the full event keyed by id, with the store's record expiry.
    async fn write_record(&self, event: &DomainEvent) -> Result<(), StoreError>;

    /// Appends the event to the stream of its `source`.
    async fn append_to_stream(&self, event: &DomainEvent) -> Result<(), StoreError>;

    /// Adds the event id to the index of its type, scored by `score_millis`.
    async fn index_by_type(&self, event: &DomainEvent, score_millis: i64)
        -> Result<(), StoreError>;

    /// Adds the event id to the index of `correlation_id`.
    async fn index_by_correlation(
        &self,
        correlation_id: &str,
        event_id: &EventId,
        score_millis: i64,
    ) -> Result<(), StoreError>;

    /// Persists an event: primary record, stream append, type index and
    /// (when present) correlation index.
    ///
    /// The writes run concurrently and independently. Index failures are
    /// logged and swallowed. A failure of the primary record or the stream
    /// append is returned, since those carry the durability guarantee.
    async fn persist(&self, event: &DomainEvent) -> Result<(), StoreError> {
        let score = Timestamp::now().as_epoch_millis();

        let (record, stream, by_type, by_correlation) = futures::join!(
            self.write_record(event),
            self.append_to_stream(event),
            self.index_by_type(event, score),
            async {
                match event.correlation_id() {
                    Some(correlation_id) => {
                        self.index_by_correlation(correlation_id, event.id(), score)
                            .await
                    }
                    None => Ok(()),
                }
            },
        );

        if let Err(e) = &by_type {
            warn!(
                event_id = %event.id(),
                event_type = %event.event_type(),
                error = %e,
                "Type index write failed; event remains readable by id"
            );
        }
        if let Err(e) = &by_correlation {
            warn!(
                event_id = %event.id(),
                correlation_id = event.correlation_id().unwrap_or_default(),
                error = %e,
                "Correlation index write failed; event remains readable by id"
            );
        }

        for (what, result) in [("record", &record), ("stream", &stream)] {
            if let Err(e) = result {
                error!(
                    event_id = %event.id(),
                    source = %event.source(),
                    write = what,
                    error = %e,
                    "Primary persistence failed"
                );
            }
        }

        record?;
        stream?;
        Ok(())
    }

    /// Returns the event with this id, or `None` if unknown or expired.
    async fn get(&self, event_id: &EventId) -> Result<Option<DomainEvent>, StoreError>;

    /// Returns up to `limit` most recently published events of a type,
    /// newest first.
    async fn get_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, StoreError>;

    /// Returns every event sharing a correlation id, oldest first.
    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<DomainEvent>, StoreError>;

    /// Returns up to `limit` events of a source stream in append order.
    async fn read_stream(&self, source: &str, limit: usize)
        -> Result<Vec<DomainEvent>, StoreError>;

    /// Liveness probe. Never fails; an unreachable store reports `false`.
    async fn health(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventStore) {}

    #[test]
    fn store_error_from_serde_is_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::Serialization(_)));
    }

    #[test]
    fn corrupt_error_names_key() {
        let err = StoreError::Corrupt {
            key: "event:1".to_string(),
            reason: "eof".to_string(),
        };
        assert_eq!(err.to_string(), "Corrupt record at 'event:1': eof");
    }
}
