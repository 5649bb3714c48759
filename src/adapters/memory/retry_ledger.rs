//! In-memory retry ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::events::RetryRecord;
use crate::domain::foundation::{EventId, HandlerId};
use crate::ports::{RetryLedger, StoreError};

/// Default lifetime of a retry record: 1 hour.
pub const DEFAULT_RETRY_TTL: Duration = Duration::from_secs(60 * 60);

/// In-memory [`RetryLedger`] keyed exactly like the Redis one.
///
/// Expired records are invisible to reads and dropped by
/// [`purge_expired`](Self::purge_expired).
#[derive(Debug)]
pub struct InMemoryRetryLedger {
    records: RwLock<HashMap<String, (RetryRecord, Instant)>>,
    ttl: Duration,
    failing: AtomicBool,
}

impl InMemoryRetryLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            failing: AtomicBool::new(false),
        }
    }

    /// Makes `record` fail until reset.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Drops expired records, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, (_, expires_at)| *expires_at > now);
        before - records.len()
    }
}

impl Default for InMemoryRetryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_TTL)
    }
}

#[async_trait]
impl RetryLedger for InMemoryRetryLedger {
    async fn record(&self, record: &RetryRecord) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("retry ledger rejected write".into()));
        }
        let expires_at = Instant::now() + self.ttl;
        self.records
            .write()
            .await
            .insert(record.key(), (record.clone(), expires_at));
        Ok(())
    }

    async fn find(
        &self,
        event_id: &EventId,
        handler_id: &HandlerId,
    ) -> Result<Option<RetryRecord>, StoreError> {
        let now = Instant::now();
        let records = self.records.read().await;
        Ok(records
            .get(&RetryRecord::key_for(event_id, handler_id))
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(record, _)| record.clone()))
    }

    async fn list_for_event(&self, event_id: &EventId) -> Result<Vec<RetryRecord>, StoreError> {
        let now = Instant::now();
        let prefix = RetryRecord::key_prefix_for(event_id);
        let records = self.records.read().await;
        let mut found: Vec<RetryRecord> = records
            .iter()
            .filter(|(key, (_, expires_at))| key.starts_with(&prefix) && *expires_at > now)
            .map(|(_, (record, _))| record)
            // Ids may contain ':', so the prefix alone can match another event.
            .filter(|record| record.event_id == *event_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.handler_id.as_str().cmp(b.handler_id.as_str()));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> HandlerId {
        HandlerId::new(s).unwrap()
    }

    #[tokio::test]
    async fn record_then_find() {
        let ledger = InMemoryRetryLedger::default();
        let event_id = EventId::new();
        ledger
            .record(&RetryRecord::new(event_id.clone(), id("mailer"), "smtp down"))
            .await
            .unwrap();

        let found = ledger.find(&event_id, &id("mailer")).await.unwrap().unwrap();
        assert_eq!(found.error, "smtp down");
        assert!(ledger.find(&event_id, &id("other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_failure_wins() {
        let ledger = InMemoryRetryLedger::default();
        let event_id = EventId::new();
        ledger
            .record(&RetryRecord::new(event_id.clone(), id("mailer"), "first"))
            .await
            .unwrap();
        ledger
            .record(&RetryRecord::new(event_id.clone(), id("mailer"), "second"))
            .await
            .unwrap();

        let records = ledger.list_for_event(&event_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error, "second");
        assert_eq!(records[0].attempts, 1);
    }

    #[tokio::test]
    async fn list_is_scoped_to_event_and_sorted_by_handler() {
        let ledger = InMemoryRetryLedger::default();
        let event_id = EventId::new();
        for handler in ["zeta", "alpha"] {
            ledger
                .record(&RetryRecord::new(event_id.clone(), id(handler), "x"))
                .await
                .unwrap();
        }
        ledger
            .record(&RetryRecord::new(EventId::new(), id("alpha"), "x"))
            .await
            .unwrap();

        let handlers: Vec<String> = ledger
            .list_for_event(&event_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.handler_id.to_string())
            .collect();
        assert_eq!(handlers, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn list_ignores_events_whose_id_extends_the_requested_one() {
        let ledger = InMemoryRetryLedger::default();
        let event_id = EventId::parse("order-1").unwrap();
        let longer = EventId::parse("order-1:retry").unwrap();
        ledger
            .record(&RetryRecord::new(longer.clone(), id("mailer"), "x"))
            .await
            .unwrap();
        ledger
            .record(&RetryRecord::new(event_id.clone(), id("audit"), "y"))
            .await
            .unwrap();

        let records = ledger.list_for_event(&event_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_id, event_id);
        assert_eq!(records[0].handler_id.as_str(), "audit");

        let records = ledger.list_for_event(&longer).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handler_id.as_str(), "mailer");
    }

    #[tokio::test(start_paused = true)]
    async fn records_expire_after_ttl() {
        let ledger = InMemoryRetryLedger::new(Duration::from_secs(3600));
        let event_id = EventId::new();
        ledger
            .record(&RetryRecord::new(event_id.clone(), id("mailer"), "x"))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(ledger.find(&event_id, &id("mailer")).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(ledger.find(&event_id, &id("mailer")).await.unwrap().is_none());
        assert_eq!(ledger.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn injected_failure_is_reported() {
        let ledger = InMemoryRetryLedger::default();
        ledger.fail_writes(true);
        let result = ledger
            .record(&RetryRecord::new(EventId::new(), id("mailer"), "x"))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
