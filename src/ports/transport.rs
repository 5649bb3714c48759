//! Transport port - Channel-based pub/sub substrate.
//!
//! The transport moves serialized envelopes between processes. Publishing
//! writes to a named channel; listening hands every message that arrives on a
//! listened channel to a [`MessageSink`] as a `(channel, raw)` pair.
//!
//! ## Ordering
//!
//! Delivery order on a channel is a property of the substrate, not of the
//! bus. Adapters hand each message to the sink on its own task, so even a
//! FIFO substrate may complete deliveries out of order. Durable per-source
//! ordering lives in the event store stream, not here.

use async_trait::async_trait;
use std::sync::Arc;

/// Receiver of inbound messages.
///
/// Implemented by the dispatcher. Delivery must never fail back into the
/// transport: the sink logs and absorbs its own errors.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, channel: &str, raw: &str);
}

/// Errors surfaced by transport adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Operation attempted without an active session
    #[error("Transport not connected")]
    NotConnected,

    /// Session could not be established or was lost
    #[error("Transport connection error: {0}")]
    Connection(String),

    /// The substrate rejected a publish
    #[error("Publish to '{channel}' failed: {reason}")]
    Publish { channel: String, reason: String },
}

/// Port for the pub/sub substrate.
///
/// # Lifecycle
///
/// `start` opens the session and binds the sink; `stop` tears it down.
/// While stopped, `publish` fails fast with [`TransportError::NotConnected`]
/// instead of queueing.
///
/// # Listening
///
/// `listen` may be called repeatedly with new channels while running.
/// Growing the listened set must not drop messages already in flight for
/// channels that were listened before.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the session and starts handing inbound messages to `sink`.
    async fn start(&self, sink: Arc<dyn MessageSink>) -> Result<(), TransportError>;

    /// Closes the session. Idempotent.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Sends one serialized envelope on `channel`.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), TransportError>;

    /// Adds channels to the listened set.
    async fn listen(&self, channels: &[String]) -> Result<(), TransportError>;

    /// Removes channels from the listened set.
    async fn unlisten(&self, channels: &[String]) -> Result<(), TransportError>;

    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;
}
