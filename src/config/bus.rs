//! Event bus configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::EventBusConfig;
use crate::domain::events::channel::DEFAULT_CHANNEL_PREFIX;
use crate::domain::events::DEFAULT_EVENT_VERSION;

/// Longest handler deadline accepted: 10 minutes.
const MAX_HANDLER_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Event bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Prefix of transport channels (`<prefix>:<type>`)
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,

    /// Lifetime of primary event records in seconds
    #[serde(default = "default_event_ttl")]
    pub event_ttl_secs: u64,

    /// Lifetime of retry records in seconds
    #[serde(default = "default_retry_ttl")]
    pub retry_ttl_secs: u64,

    /// Per-handler deadline in milliseconds; 0 disables it
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_ms: u64,

    /// Envelope version assigned to events published without one
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Event types the daemon's audit handler subscribes to (comma-separated)
    pub audit_event_types: Option<String>,
}

impl BusConfig {
    pub fn event_ttl(&self) -> Duration {
        Duration::from_secs(self.event_ttl_secs)
    }

    pub fn retry_ttl(&self) -> Duration {
        Duration::from_secs(self.retry_ttl_secs)
    }

    /// Handler deadline, `None` when disabled
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }

    /// Get audit event types as a vector
    pub fn audit_event_types_list(&self) -> Vec<String> {
        self.audit_event_types
            .as_ref()
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Settings handed to the bus itself
    pub fn to_event_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            channel_prefix: self.channel_prefix.clone(),
            default_version: self.default_version.clone(),
            handler_timeout: self.handler_timeout(),
        }
    }

    /// Validate bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_prefix.is_empty()
            || self.channel_prefix.contains(':')
            || self.channel_prefix.contains('*')
        {
            return Err(ValidationError::InvalidChannelPrefix);
        }
        if self.default_version.trim().is_empty() {
            return Err(ValidationError::EmptyDefaultVersion);
        }
        if self.event_ttl_secs == 0 {
            return Err(ValidationError::ZeroTtl("Event"));
        }
        if self.retry_ttl_secs == 0 {
            return Err(ValidationError::ZeroTtl("Retry"));
        }
        if self.handler_timeout_ms > MAX_HANDLER_TIMEOUT_MS {
            return Err(ValidationError::HandlerTimeoutTooLarge);
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_prefix: default_channel_prefix(),
            event_ttl_secs: default_event_ttl(),
            retry_ttl_secs: default_retry_ttl(),
            handler_timeout_ms: default_handler_timeout(),
            default_version: default_version(),
            audit_event_types: None,
        }
    }
}

fn default_channel_prefix() -> String {
    DEFAULT_CHANNEL_PREFIX.to_string()
}

fn default_event_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_retry_ttl() -> u64 {
    60 * 60
}

fn default_handler_timeout() -> u64 {
    30_000
}

fn default_version() -> String {
    DEFAULT_EVENT_VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_config_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.channel_prefix, "events");
        assert_eq!(config.event_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.retry_ttl(), Duration::from_secs(3600));
        assert_eq!(config.handler_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.default_version, "1.0.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_handler_timeout_disables_deadline() {
        let config = BusConfig {
            handler_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.handler_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_audit_event_types_parsing() {
        let config = BusConfig {
            audit_event_types: Some("order.created, order.paid,,".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.audit_event_types_list(),
            vec!["order.created", "order.paid"]
        );
    }

    #[test]
    fn test_to_event_bus_config() {
        let config = BusConfig {
            channel_prefix: "audit".to_string(),
            handler_timeout_ms: 250,
            ..Default::default()
        };
        let bus = config.to_event_bus_config();
        assert_eq!(bus.channel_prefix, "audit");
        assert_eq!(bus.handler_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validation_rejects_bad_prefix() {
        for prefix in ["", "a:b", "ev*"] {
            let config = BusConfig {
                channel_prefix: prefix.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted {prefix:?}");
        }
    }

    #[test]
    fn test_validation_rejects_zero_ttls() {
        let config = BusConfig {
            retry_ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_huge_handler_timeout() {
        let config = BusConfig {
            handler_timeout_ms: MAX_HANDLER_TIMEOUT_MS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
