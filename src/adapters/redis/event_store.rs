//! Redis event store.
//!
//! Primary records are plain string keys with an expiry, per-source streams
//! are Redis streams, and both indexes are sorted sets of event ids scored by
//! publish time in epoch millis. Index reads resolve ids with a single MGET;
//! ids whose record has expired are skipped.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

use crate::domain::events::DomainEvent;
use crate::domain::foundation::EventId;
use crate::ports::{EventStore, StoreError};

/// Field holding the serialized envelope in stream entries.
const STREAM_FIELD: &str = "event";

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed [`EventStore`].
#[derive(Clone)]
pub struct RedisEventStore {
    conn: ConnectionManager,
    event_ttl: Duration,
    health_timeout: Duration,
}

impl RedisEventStore {
    pub fn new(conn: ConnectionManager, event_ttl: Duration) -> Self {
        Self {
            conn,
            event_ttl,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    /// Bounds how long [`EventStore::health`] waits for PING.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn record_key(event_id: &str) -> String {
        format!("event:{}", event_id)
    }

    fn stream_key(source: &str) -> String {
        format!("stream:{}", source)
    }

    fn type_key(event_type: &str) -> String {
        format!("events:type:{}", event_type)
    }

    fn correlation_key(correlation_id: &str) -> String {
        format!("events:correlation:{}", correlation_id)
    }

    fn decode(key: &str, raw: &str) -> Result<DomainEvent, StoreError> {
        DomainEvent::from_json(raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolves index members to events, preserving order and skipping
    /// expired or unreadable records.
    async fn load_all(&self, ids: Vec<String>) -> Result<Vec<DomainEvent>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| Self::record_key(id)).collect();
        let mut conn = self.conn.clone();
        let raws: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut events = Vec::with_capacity(raws.len());
        for (key, raw) in keys.iter().zip(raws) {
            let Some(raw) = raw else { continue };
            match Self::decode(key, &raw) {
                Ok(event) => events.push(event),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable event record"),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn write_record(&self, event: &DomainEvent) -> Result<(), StoreError> {
        let json = event.to_json()?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::record_key(event.id().as_str()), json, self.event_ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn append_to_stream(&self, event: &DomainEvent) -> Result<(), StoreError> {
        let json = event.to_json()?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(Self::stream_key(event.source()), "*", &[(STREAM_FIELD, json)])
            .await?;
        Ok(())
    }

    async fn index_by_type(
        &self,
        event: &DomainEvent,
        score_millis: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(
                Self::type_key(event.event_type()),
                event.id().as_str(),
                score_millis,
            )
            .await?;
        Ok(())
    }

    async fn index_by_correlation(
        &self,
        correlation_id: &str,
        event_id: &EventId,
        score_millis: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(
                Self::correlation_key(correlation_id),
                event_id.as_str(),
                score_millis,
            )
            .await?;
        Ok(())
    }

    async fn get(&self, event_id: &EventId) -> Result<Option<DomainEvent>, StoreError> {
        let key = Self::record_key(event_id.as_str());
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|raw| Self::decode(&key, &raw)).transpose()
    }

    async fn get_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let ids: Vec<String> = conn.zrevrange(Self::type_key(event_type), 0, stop).await?;
        self.load_all(ids).await
    }

    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .zrange(Self::correlation_key(correlation_id), 0, -1)
            .await?;
        self.load_all(ids).await
    }

    async fn read_stream(&self, source: &str, limit: usize) -> Result<Vec<DomainEvent>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let key = Self::stream_key(source);
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = conn.xrange_count(&key, "-", "+", limit).await?;

        reply
            .ids
            .iter()
            .map(|entry| {
                let raw: String = entry.get(STREAM_FIELD).ok_or_else(|| StoreError::Corrupt {
                    key: format!("{}#{}", key, entry.id),
                    reason: format!("missing '{}' field", STREAM_FIELD),
                })?;
                Self::decode(&key, &raw)
            })
            .collect()
    }

    async fn health(&self) -> bool {
        let mut conn = self.conn.clone();
        let ping = async move {
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(pong)
        };
        match tokio::time::timeout(self.health_timeout, ping).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Redis health check failed");
                false
            }
            Err(_) => {
                warn!("Redis health check timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_documented_layout() {
        assert_eq!(RedisEventStore::record_key("e-1"), "event:e-1");
        assert_eq!(RedisEventStore::stream_key("orders"), "stream:orders");
        assert_eq!(RedisEventStore::type_key("order.created"), "events:type:order.created");
        assert_eq!(
            RedisEventStore::correlation_key("c-1"),
            "events:correlation:c-1"
        );
    }

    #[test]
    fn decode_reports_corrupt_key() {
        let err = RedisEventStore::decode("event:e-1", "{oops").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { key, .. } if key == "event:e-1"));
    }
}
