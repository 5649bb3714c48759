//! Redis adapters for production deployments.
//!
//! Key layout:
//!
//! | Key | Type | Expiry |
//! |-----|------|--------|
//! | `event:<id>` | string (JSON envelope) | event TTL (7 days) |
//! | `stream:<source>` | stream, field `event` | none |
//! | `events:type:<type>` | sorted set of ids, score = publish millis | none |
//! | `events:correlation:<id>` | sorted set of ids, score = publish millis | none |
//! | `retry:<eventId>:<handlerId>` | string (JSON retry record) | retry TTL (1 hour) |
//!
//! Events travel over Redis pub/sub on `<prefix>:<type>` channels.
//!
//! ## Usage
//!
//! ```ignore
//! let conn = connect(&config.redis).await?;
//! let store = RedisEventStore::new(conn.clone(), config.bus.event_ttl());
//! let ledger = RedisRetryLedger::new(conn, config.bus.retry_ttl());
//! let transport = RedisTransport::new(&config.redis, &config.bus.channel_prefix)?;
//! ```

mod event_store;
mod retry_ledger;
mod transport;

pub use event_store::RedisEventStore;
pub use retry_ledger::RedisRetryLedger;
pub use transport::RedisTransport;

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tracing::info;

use crate::config::RedisConfig;
use crate::ports::{StoreError, TransportError};

/// Opens a managed, auto-reconnecting connection.
pub async fn connect(config: &RedisConfig) -> Result<ConnectionManager, StoreError> {
    let client = Client::open(config.url.as_str())?;
    let conn = tokio::time::timeout(config.timeout(), ConnectionManager::new(client))
        .await
        .map_err(|_| {
            StoreError::Unavailable(format!(
                "connection timed out after {}s",
                config.timeout_secs
            ))
        })??;

    info!("Connected to Redis");
    Ok(conn)
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<RedisError> for TransportError {
    fn from(err: RedisError) -> Self {
        TransportError::Connection(err.to_string())
    }
}
