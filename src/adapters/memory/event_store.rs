//! In-memory event store for tests and single-process runs.
//!
//! Mirrors the Redis layout closely enough that the bus behaves the same on
//! both: records expire, streams are append-only and never expire, and the
//! two indexes behave like sorted sets (one entry per event id, ordered by
//! score, ties broken by insertion order). Index entries outlive their
//! records; reads skip ids whose record has expired.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::events::DomainEvent;
use crate::domain::foundation::EventId;
use crate::ports::{EventStore, StoreError};

/// Default lifetime of a primary record: 7 days.
pub const DEFAULT_EVENT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The four independent writes of a persist, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreWrite {
    Record,
    Stream,
    TypeIndex,
    CorrelationIndex,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    score: i64,
    seq: u64,
    event_id: EventId,
}

/// Sorted-set emulation: unique members, ordered by `(score, seq)`.
#[derive(Debug, Default)]
struct SortedIndex {
    entries: Vec<IndexEntry>,
}

impl SortedIndex {
    fn add(&mut self, event_id: &EventId, score: i64, seq: u64) {
        self.entries.retain(|e| &e.event_id != event_id);
        self.entries.push(IndexEntry {
            score,
            seq,
            event_id: event_id.clone(),
        });
        self.entries.sort_by_key(|e| (e.score, e.seq));
    }

    fn ascending(&self) -> impl DoubleEndedIterator<Item = &EventId> {
        self.entries.iter().map(|e| &e.event_id)
    }
}

#[derive(Debug)]
struct StoredRecord {
    event: DomainEvent,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<EventId, StoredRecord>,
    streams: HashMap<String, Vec<DomainEvent>>,
    by_type: HashMap<String, SortedIndex>,
    by_correlation: HashMap<String, SortedIndex>,
}

impl State {
    fn live(&self, event_id: &EventId, now: Instant) -> Option<&DomainEvent> {
        self.records
            .get(event_id)
            .filter(|r| r.expires_at > now)
            .map(|r| &r.event)
    }
}

/// In-memory [`EventStore`].
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryEventStore::new());
/// store.fail_writes(StoreWrite::TypeIndex);
/// ```
#[derive(Debug)]
pub struct InMemoryEventStore {
    state: RwLock<State>,
    ttl: Duration,
    seq: AtomicU64,
    healthy: AtomicBool,
    failing: Mutex<HashSet<StoreWrite>>,
}

impl InMemoryEventStore {
    /// Creates an empty store with the 7-day record lifetime.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_EVENT_TTL)
    }

    /// Creates an empty store with a custom record lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(State::default()),
            ttl,
            seq: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            failing: Mutex::new(HashSet::new()),
        }
    }

    // === Test Helpers ===

    /// Makes every subsequent write of this kind fail.
    pub fn fail_writes(&self, write: StoreWrite) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(write);
    }

    /// Clears all injected write failures.
    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Sets what [`EventStore::health`] reports.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of primary records held, expired or not.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    fn check(&self, write: StoreWrite) -> Result<(), StoreError> {
        let failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
        if failing.contains(&write) {
            return Err(StoreError::Unavailable(format!("{:?} write rejected", write)));
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn write_record(&self, event: &DomainEvent) -> Result<(), StoreError> {
        self.check(StoreWrite::Record)?;
        let expires_at = Instant::now() + self.ttl;
        self.state.write().await.records.insert(
            event.id().clone(),
            StoredRecord {
                event: event.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn append_to_stream(&self, event: &DomainEvent) -> Result<(), StoreError> {
        self.check(StoreWrite::Stream)?;
        self.state
            .write()
            .await
            .streams
            .entry(event.source().to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn index_by_type(
        &self,
        event: &DomainEvent,
        score_millis: i64,
    ) -> Result<(), StoreError> {
        self.check(StoreWrite::TypeIndex)?;
        let seq = self.next_seq();
        self.state
            .write()
            .await
            .by_type
            .entry(event.event_type().to_string())
            .or_default()
            .add(event.id(), score_millis, seq);
        Ok(())
    }

    async fn index_by_correlation(
        &self,
        correlation_id: &str,
        event_id: &EventId,
        score_millis: i64,
    ) -> Result<(), StoreError> {
        self.check(StoreWrite::CorrelationIndex)?;
        let seq = self.next_seq();
        self.state
            .write()
            .await
            .by_correlation
            .entry(correlation_id.to_string())
            .or_default()
            .add(event_id, score_millis, seq);
        Ok(())
    }

    async fn get(&self, event_id: &EventId) -> Result<Option<DomainEvent>, StoreError> {
        let state = self.state.read().await;
        Ok(state.live(event_id, Instant::now()).cloned())
    }

    async fn get_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let state = self.state.read().await;
        let now = Instant::now();
        let Some(index) = state.by_type.get(event_type) else {
            return Ok(Vec::new());
        };
        Ok(index
            .ascending()
            .rev()
            .take(limit)
            .filter_map(|id| state.live(id, now).cloned())
            .collect())
    }

    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let state = self.state.read().await;
        let now = Instant::now();
        let Some(index) = state.by_correlation.get(correlation_id) else {
            return Ok(Vec::new());
        };
        Ok(index
            .ascending()
            .filter_map(|id| state.live(id, now).cloned())
            .collect())
    }

    async fn read_stream(&self, source: &str, limit: usize) -> Result<Vec<DomainEvent>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(source)
            .map(|stream| stream.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn health(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
