//! Retry records written when a handler fails to process an event.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, HandlerId, Timestamp};

/// One failed (event, handler) pair awaiting operational inspection.
///
/// Records are keyed by `retry:<eventId>:<handlerId>`. A new failure for the
/// same pair overwrites the previous record, so `attempts` describes the
/// latest failure only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRecord {
    pub event_id: EventId,
    pub handler_id: HandlerId,
    pub error: String,
    pub recorded_at: Timestamp,
    pub attempts: u32,
}

impl RetryRecord {
    /// Creates a record for a first failed attempt, stamped now.
    pub fn new(event_id: EventId, handler_id: HandlerId, error: impl Into<String>) -> Self {
        Self {
            event_id,
            handler_id,
            error: error.into(),
            recorded_at: Timestamp::now(),
            attempts: 1,
        }
    }

    /// Storage key for this record.
    pub fn key(&self) -> String {
        Self::key_for(&self.event_id, &self.handler_id)
    }

    /// Storage key for an (event, handler) pair.
    pub fn key_for(event_id: &EventId, handler_id: &HandlerId) -> String {
        format!("retry:{}:{}", event_id, handler_id)
    }

    /// Key prefix shared by every record of one event.
    pub fn key_prefix_for(event_id: &EventId) -> String {
        format!("retry:{}:", event_id)
    }
}
