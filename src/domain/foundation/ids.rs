//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ValidationError;

/// Unique identifier for a domain event.
///
/// Wraps a `String` rather than a `Uuid` so that producers may supply their
/// own id formats (ULID, snowflake, ...). Generated ids are UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string, rejecting empty input.
    pub fn parse(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(ValidationError::empty_field("id"));
        }
        Ok(Self(s))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is empty (only reachable through deserialization).
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a subscribed handler.
///
/// Assigned at registration time. Used to key retry records
/// (`retry:<eventId>:<handlerId>`) and in every handler log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(String);

impl HandlerId {
    /// Creates a handler id, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("handler_id"));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for HandlerId {
    type Error = ValidationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_new_generates_unique_ids() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn event_id_parse_rejects_empty() {
        assert!(EventId::parse("").is_err());
        assert!(EventId::parse("   ").is_err());
    }

    #[test]
    fn event_id_serializes_as_plain_string() {
        let id = EventId::parse("evt-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"evt-1\"");
    }

    #[test]
    fn handler_id_rejects_empty() {
        assert!(HandlerId::new("").is_err());
        assert!(HandlerId::try_from("projector").is_ok());
    }

    #[test]
    fn handler_id_displays_inner_value() {
        let id = HandlerId::new("email-notifier").unwrap();
        assert_eq!(id.to_string(), "email-notifier");
    }
}
