//! Event Bus - durable publish/subscribe for domain events
//!
//! Events published on the bus are enriched once, persisted (primary record,
//! per-source stream, type and correlation indexes) and handed to a
//! channel-based transport. Subscribers run concurrently and in isolation;
//! their failures land in an expiring retry ledger instead of reaching the
//! publisher.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

pub use application::{BusError, EventBus, EventBusConfig};
pub use domain::events::{DomainEvent, EventDraft};
pub use domain::foundation::{EventId, HandlerId};
