//! Operational snapshot exposed by the bus.

use serde::{Deserialize, Serialize};

/// Point-in-time view of the bus for health endpoints and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStats {
    /// True while the bus is in the running state.
    pub running: bool,

    /// Number of distinct handler ids subscribed across all types.
    pub handler_count: usize,

    /// Event types with at least one subscriber, sorted.
    pub event_types: Vec<String>,

    /// Whether the transport session is currently connected.
    pub transport_connected: bool,
}
