//! Domain event envelope and its publish-time enrichment.
//!
//! Two types model the two halves of an event's life:
//!
//! - [`EventDraft`] is what a producer hands to the bus. `id`, `timestamp`
//!   and `version` are optional.
//! - [`DomainEvent`] is the enriched, immutable envelope that gets persisted,
//!   transmitted and replayed. Every envelope field is present.
//!
//! The only way from a draft to an event is [`EventDraft::enrich`], so an
//! event read back from the store or the transport can never be enriched a
//! second time.
//!
//! The wire shape uses the field names `id, type, source, payload,
//! timestamp, version, correlationId`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::foundation::{EventId, Timestamp, ValidationError};

/// Envelope schema version assigned when the producer supplies none.
pub const DEFAULT_EVENT_VERSION: &str = "1.0.0";

/// Publish-time input: an event whose envelope may be incomplete.
///
/// # Example
///
/// ```ignore
/// let draft = EventDraft::new("order.created", "orders", json!({"orderId": "42"}))
///     .with_correlation_id("c-1");
/// let event = bus.publish(draft).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,

    #[serde(rename = "type")]
    pub event_type: String,

    pub source: String,

    #[serde(default)]
    pub payload: JsonValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl EventDraft {
    /// Creates a draft with only the required fields.
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            source: source.into(),
            payload,
            timestamp: None,
            version: None,
            correlation_id: None,
        }
    }

    /// Supplies an explicit event id.
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    /// Supplies an explicit creation time.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Supplies an explicit envelope version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Groups this event into a causal chain.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Assigns any missing `id`, `timestamp` and `version` and checks the
    /// required envelope fields.
    ///
    /// Values already present are kept as-is. An empty correlation id is
    /// treated as absent.
    pub fn enrich(self, default_version: &str) -> Result<DomainEvent, ValidationError> {
        require_non_empty("type", &self.event_type)?;
        require_non_empty("source", &self.source)?;

        let id = match self.id {
            Some(id) if id.is_empty() => return Err(ValidationError::empty_field("id")),
            Some(id) => id,
            None => EventId::new(),
        };

        let version = match self.version {
            Some(version) => {
                require_non_empty("version", &version)?;
                version
            }
            None => {
                require_non_empty("version", default_version)?;
                default_version.to_string()
            }
        };

        Ok(DomainEvent {
            id,
            event_type: self.event_type,
            source: self.source,
            payload: self.payload,
            timestamp: self.timestamp.unwrap_or_else(Timestamp::now),
            version,
            correlation_id: self.correlation_id.filter(|c| !c.trim().is_empty()),
        })
    }
}

/// A fully enriched domain event.
///
/// Fields are read-only once constructed; the `id` in particular never
/// changes after enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    id: EventId,

    #[serde(rename = "type")]
    event_type: String,

    source: String,

    #[serde(default)]
    payload: JsonValue,

    timestamp: Timestamp,

    version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl DomainEvent {
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Routing discriminator, e.g. `user.created`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Logical origin; the per-source stream partition key.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Deserialize payload to a specific type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Checks the envelope invariants on an event that arrived from outside
    /// (transport or store) rather than through [`EventDraft::enrich`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::empty_field("id"));
        }
        require_non_empty("type", &self.event_type)?;
        require_non_empty("source", &self.source)?;
        require_non_empty("version", &self.version)?;
        Ok(())
    }

    /// Serializes the envelope to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses the JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl From<DomainEvent> for EventDraft {
    /// Turns an existing event back into a draft with every envelope field
    /// set, so enriching it again changes nothing.
    fn from(event: DomainEvent) -> Self {
        Self {
            id: Some(event.id),
            event_type: event.event_type,
            source: event.source,
            payload: event.payload,
            timestamp: Some(event.timestamp),
            version: Some(event.version),
            correlation_id: event.correlation_id,
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    Ok(())
}

#[cfg(test)]
impl DomainEvent {
    /// Creates a test fixture event for use in tests.
    pub fn test_fixture(event_type: &str) -> Self {
        EventDraft::new(event_type, "test-source", serde_json::json!({"test": "data"}))
            .enrich(DEFAULT_EVENT_VERSION)
            .expect("fixture draft is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn draft() -> EventDraft {
        EventDraft::new("user.created", "users", json!({"userId": "u-1"}))
    }

    #[test]
    fn enrich_assigns_missing_envelope_fields() {
        let before = Timestamp::now();
        let event = draft().enrich(DEFAULT_EVENT_VERSION).unwrap();

        assert!(!event.id().is_empty());
        assert_eq!(event.version(), "1.0.0");
        assert!(!event.timestamp().is_before(&before));
        assert!(event.correlation_id().is_none());
    }

    #[test]
    fn enrich_preserves_supplied_envelope_fields() {
        let id = EventId::parse("evt-123").unwrap();
        let ts = Timestamp::parse("2024-01-15T10:30:00Z").unwrap();

        let event = draft()
            .with_id(id.clone())
            .with_timestamp(ts)
            .with_version("2.1.0")
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap();

        assert_eq!(event.id(), &id);
        assert_eq!(event.timestamp(), ts);
        assert_eq!(event.version(), "2.1.0");
    }

    #[test]
    fn enrich_rejects_empty_type() {
        let err = EventDraft::new("  ", "users", json!({}))
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap_err();
        assert_eq!(err, ValidationError::empty_field("type"));
    }

    #[test]
    fn enrich_rejects_empty_source() {
        let err = EventDraft::new("user.created", "", json!({}))
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap_err();
        assert_eq!(err, ValidationError::empty_field("source"));
    }

    #[test]
    fn enrich_drops_blank_correlation_id() {
        let event = draft()
            .with_correlation_id("")
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap();
        assert!(event.correlation_id().is_none());
    }

    #[test]
    fn re_enriching_an_event_changes_nothing() {
        let event = draft()
            .with_correlation_id("c-1")
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap();
        let again = EventDraft::from(event.clone()).enrich("9.9.9").unwrap();
        assert_eq!(event, again);
    }

    #[test]
    fn wire_format_uses_envelope_field_names() {
        let event = draft()
            .with_correlation_id("c-1")
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap();
        let value: JsonValue = serde_json::to_value(&event).unwrap();

        for field in ["id", "type", "source", "payload", "timestamp", "version", "correlationId"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn correlation_id_is_omitted_when_absent() {
        let event = draft().enrich(DEFAULT_EVENT_VERSION).unwrap();
        let value: JsonValue = serde_json::to_value(&event).unwrap();
        assert!(value.get("correlationId").is_none());
    }

    #[test]
    fn json_roundtrip_preserves_event() {
        let event = draft()
            .with_correlation_id("c-1")
            .enrich(DEFAULT_EVENT_VERSION)
            .unwrap();
        let back = DomainEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn validate_rejects_inbound_event_with_empty_type() {
        let raw = r#"{"id":"e1","type":"","source":"s","payload":{},"timestamp":"2024-01-15T10:30:00Z","version":"1.0.0"}"#;
        let event = DomainEvent::from_json(raw).unwrap();
        assert!(event.validate().is_err());
    }

    #[test]
    fn payload_as_deserializes_payload() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UserCreated {
            user_id: String,
        }

        let event = draft().enrich(DEFAULT_EVENT_VERSION).unwrap();
        let payload: UserCreated = event.payload_as().unwrap();
        assert_eq!(payload.user_id, "u-1");
    }

    proptest! {
        #[test]
        fn enrichment_keeps_non_empty_required_fields(
            event_type in "[a-z]{1,12}\\.[a-z]{1,12}",
            source in "[a-z][a-z0-9-]{0,15}",
        ) {
            let event = EventDraft::new(event_type.clone(), source.clone(), json!(null))
                .enrich(DEFAULT_EVENT_VERSION)
                .unwrap();
            prop_assert_eq!(event.event_type(), event_type.as_str());
            prop_assert_eq!(event.source(), source.as_str());
            prop_assert!(event.validate().is_ok());
        }

        #[test]
        fn explicit_ids_survive_enrichment(id in "[A-Za-z0-9-]{1,36}") {
            let event = draft()
                .with_id(EventId::parse(id.clone()).unwrap())
                .enrich(DEFAULT_EVENT_VERSION)
                .unwrap();
            prop_assert_eq!(event.id().as_str(), id.as_str());
        }
    }
}
