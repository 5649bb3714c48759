//! Errors surfaced to callers of the event bus.

use thiserror::Error;

use crate::domain::events::BusState;
use crate::domain::foundation::ValidationError;
use crate::ports::{StoreError, TransportError};

/// Errors returned by [`EventBus`](super::EventBus) operations.
///
/// Publishers only ever see failures of their own call: lifecycle,
/// envelope validation, serialization, primary persistence and transport
/// hand-off. Subscriber failures never surface here.
#[derive(Debug, Error)]
pub enum BusError {
    /// Operation requires the running state
    #[error("Event bus is not running")]
    NotRunning,

    #[error("Invalid bus state transition from {from} to {to}")]
    InvalidTransition { from: BusState, to: BusState },

    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event serialization failed: {0}")]
    Serialization(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
}

impl BusError {
    /// True for the lifecycle guard error.
    pub fn is_not_running(&self) -> bool {
        matches!(self, BusError::NotRunning)
    }

    /// True when retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::Transport(_))
    }
}
