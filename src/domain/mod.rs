//! Domain layer containing the event bus vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `events` - Event envelope, retry records, bus lifecycle and stats

pub mod events;
pub mod foundation;
