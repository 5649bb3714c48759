//! Event bus domain types.
//!
//! - `EventDraft` / `DomainEvent` - publish input and the enriched envelope
//! - `RetryRecord` - failed (event, handler) pair
//! - `BusState` - lifecycle state machine
//! - `BusStats` - operational snapshot
//! - `channel` - transport channel naming

pub mod channel;
mod envelope;
mod lifecycle;
mod retry;
mod stats;

pub use envelope::{DomainEvent, EventDraft, DEFAULT_EVENT_VERSION};
pub use lifecycle::BusState;
pub use retry::RetryRecord;
pub use stats::BusStats;
