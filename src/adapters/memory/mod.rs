//! In-memory adapters for tests and single-process deployments.
//!
//! They honour record expiry, sorted-index ordering and per-source stream
//! order, and expose fault injection so failure paths can be exercised
//! without external services.

mod event_store;
mod retry_ledger;
mod transport;

pub use event_store::{InMemoryEventStore, StoreWrite, DEFAULT_EVENT_TTL};
pub use retry_ledger::{InMemoryRetryLedger, DEFAULT_RETRY_TTL};
pub use transport::InMemoryTransport;
