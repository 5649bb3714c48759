//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the bus and the outside world. Adapters implement these ports.
//!
//! - `EventHandler` - Subscriber capability invoked on delivery
//! - `EventStore` - Durable event records, streams and indexes
//! - `RetryLedger` - Expiring record of handler failures
//! - `Transport` / `MessageSink` - Channel-based pub/sub substrate

mod event_handler;
mod event_store;
mod retry_ledger;
mod transport;

pub use event_handler::{handler_fn, EventHandler, FnHandler};
pub use event_store::{EventStore, StoreError};
pub use retry_ledger::RetryLedger;
pub use transport::{MessageSink, Transport, TransportError};
