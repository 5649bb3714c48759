//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the bus to external systems:
//! - `memory` - In-process store, ledger and transport (tests, local runs)
//! - `redis` - Redis store, ledger and pub/sub transport (production)

mod listened;
pub mod memory;
pub mod redis;

pub use memory::{InMemoryEventStore, InMemoryRetryLedger, InMemoryTransport, StoreWrite};
pub use self::redis::{RedisEventStore, RedisRetryLedger, RedisTransport};
