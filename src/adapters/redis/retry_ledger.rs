//! Redis retry ledger.
//!
//! Each record is a JSON string under `retry:<eventId>:<handlerId>` with a
//! fixed expiry; Redis purges it when the TTL elapses. A new failure for the
//! same pair simply overwrites the key.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

use crate::domain::events::RetryRecord;
use crate::domain::foundation::{EventId, HandlerId};
use crate::ports::{RetryLedger, StoreError};

const SCAN_BATCH: usize = 100;

/// Redis-backed [`RetryLedger`].
#[derive(Clone)]
pub struct RedisRetryLedger {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisRetryLedger {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }

    fn decode(key: &str, raw: &str) -> Result<RetryRecord, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

/// Escapes glob metacharacters so an id matches only itself in SCAN MATCH.
fn escape_glob(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl RetryLedger for RedisRetryLedger {
    async fn record(&self, record: &RetryRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(record.key(), json, self.ttl.as_secs()).await?;
        Ok(())
    }

    async fn find(
        &self,
        event_id: &EventId,
        handler_id: &HandlerId,
    ) -> Result<Option<RetryRecord>, StoreError> {
        let key = RetryRecord::key_for(event_id, handler_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|raw| Self::decode(&key, &raw)).transpose()
    }

    async fn list_for_event(&self, event_id: &EventId) -> Result<Vec<RetryRecord>, StoreError> {
        let pattern = format!("{}*", escape_glob(&RetryRecord::key_prefix_for(event_id)));
        let keys = self.scan_keys(&pattern).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let raws: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut records = Vec::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(raws) {
            // Expired between SCAN and MGET.
            let Some(raw) = raw else { continue };
            match Self::decode(key, &raw) {
                // Ids may contain ':', so the prefix alone can match another event.
                Ok(record) if record.event_id == *event_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable retry record"),
            }
        }
        records.sort_by(|a, b| a.handler_id.as_str().cmp(b.handler_id.as_str()));
        Ok(records)
    }
}
