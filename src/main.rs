//! event-bus: standalone bus daemon
//!
//! Connects the bus to Redis, subscribes an audit handler that logs every
//! event of the configured types, and reports bus stats periodically until
//! Ctrl-C.
//!
//! ## Configuration
//! - EVENT_BUS__REDIS__URL: Redis connection URL (required)
//! - EVENT_BUS__REDIS__PUBSUB_URL: separate pub/sub server (optional)
//! - EVENT_BUS__BUS__AUDIT_EVENT_TYPES: comma-separated types to audit
//! - EVENT_BUS__BUS__HANDLER_TIMEOUT_MS: per-handler deadline, 0 disables
//! - EVENT_BUS__TELEMETRY__ENVIRONMENT / LOG_LEVEL / JSON_LOGS: logging

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use event_bus::adapters::redis::{connect, RedisEventStore, RedisRetryLedger, RedisTransport};
use event_bus::config::AppConfig;
use event_bus::domain::foundation::DomainError;
use event_bus::ports::EventHandler;
use event_bus::telemetry::init_tracing;
use event_bus::{DomainEvent, EventBus, HandlerId};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Logs every event it receives.
struct AuditLog;

#[async_trait]
impl EventHandler for AuditLog {
    async fn handle(&self, event: DomainEvent) -> Result<(), DomainError> {
        info!(
            event_id = %event.id(),
            event_type = %event.event_type(),
            source = %event.source(),
            correlation_id = event.correlation_id().unwrap_or_default(),
            timestamp = %event.timestamp().to_rfc3339(),
            "audit"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.telemetry);
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!(environment = ?config.telemetry.environment, "Starting event bus");

    let conn = connect(&config.redis).await?;
    let store = RedisEventStore::new(conn.clone(), config.bus.event_ttl())
        .with_health_timeout(config.redis.health_timeout());
    let ledger = RedisRetryLedger::new(conn, config.bus.retry_ttl());
    let transport = RedisTransport::new(&config.redis, &config.bus.channel_prefix)?;

    let bus = Arc::new(EventBus::with_config(
        Arc::new(store),
        Arc::new(transport),
        Arc::new(ledger),
        config.bus.to_event_bus_config(),
    ));

    let audit: Arc<dyn EventHandler> = Arc::new(AuditLog);
    let audit_id = HandlerId::new("audit-log")?;
    for event_type in config.bus.audit_event_types_list() {
        bus.subscribe(&event_type, audit_id.clone(), audit.clone())
            .await?;
    }

    bus.start().await?;

    let reporter = {
        let bus = bus.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATS_INTERVAL);
            loop {
                ticker.tick().await;
                let stats = bus.stats();
                let healthy = bus.health().await;
                if !healthy || !stats.transport_connected {
                    warn!(
                        healthy,
                        transport_connected = stats.transport_connected,
                        "Event bus degraded"
                    );
                }
                info!(
                    running = stats.running,
                    handler_count = stats.handler_count,
                    event_types = ?stats.event_types,
                    transport_connected = stats.transport_connected,
                    healthy,
                    "Event bus stats"
                );
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    reporter.abort();
    bus.stop().await?;
    Ok(())
}
