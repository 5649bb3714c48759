//! Transport channel naming.
//!
//! Each event type travels on its own channel, `<prefix>:<type>`, where the
//! prefix defaults to `events`.

/// Default channel prefix.
pub const DEFAULT_CHANNEL_PREFIX: &str = "events";

/// Channel an event type is published on.
pub fn channel_for(prefix: &str, event_type: &str) -> String {
    format!("{}:{}", prefix, event_type)
}

/// Pattern matching every channel under `prefix`.
pub fn channel_pattern(prefix: &str) -> String {
    format!("{}:*", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn channel_for_uses_prefix() {
        assert_eq!(channel_for("events", "order.created"), "events:order.created");
    }

    #[test]
    fn pattern_covers_prefix() {
        assert_eq!(channel_pattern("events"), "events:*");
    }

    proptest! {
        #[test]
        fn channel_stays_under_its_pattern(event_type in "[a-z][a-z0-9.:_-]{0,30}") {
            let channel = channel_for(DEFAULT_CHANNEL_PREFIX, &event_type);
            let pattern = channel_pattern(DEFAULT_CHANNEL_PREFIX);
            prop_assert!(channel.starts_with(pattern.trim_end_matches('*')));
            prop_assert!(channel.ends_with(event_type.as_str()));
        }
    }
}
