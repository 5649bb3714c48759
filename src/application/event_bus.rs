//! EventBus - lifecycle, publish path and query facade.
//!
//! The bus ties the ports together:
//!
//! ```text
//! publish ──► enrich ──► EventStore::persist ──► Transport::publish
//!                                                     │
//!                      Transport ──► Dispatcher ──► handlers (fan-out)
//!                                        │
//!                                        └──► RetryLedger (on failure)
//! ```
//!
//! `publish` returns once the transport has accepted the message. It never
//! waits for subscribers; durability comes from the store, not from handler
//! acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::events::channel::{channel_for, DEFAULT_CHANNEL_PREFIX};
use crate::domain::events::{
    BusState, BusStats, DomainEvent, EventDraft, RetryRecord, DEFAULT_EVENT_VERSION,
};
use crate::domain::foundation::{EventId, HandlerId, StateMachine, ValidationError};
use crate::ports::{EventHandler, EventStore, MessageSink, RetryLedger, Transport};

use super::dispatcher::Dispatcher;
use super::error::BusError;
use super::subscription_registry::{Subscribed, SubscriptionRegistry, Unsubscribed};

/// Default per-handler deadline.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables of the bus itself. Adapter settings live with the adapters.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel prefix; events of type `T` travel on `<prefix>:T`.
    pub channel_prefix: String,
    /// Version assigned to drafts that carry none.
    pub default_version: String,
    /// Per-handler deadline; `None` lets handlers run unbounded.
    pub handler_timeout: Option<Duration>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            default_version: DEFAULT_EVENT_VERSION.to_string(),
            handler_timeout: Some(DEFAULT_HANDLER_TIMEOUT),
        }
    }
}

/// Publish/subscribe bus with durable storage and failure bookkeeping.
///
/// # Example
///
/// ```ignore
/// let bus = EventBus::new(store, transport, ledger);
/// bus.subscribe("order.created", HandlerId::new("mailer")?, Arc::new(Mailer)).await?;
/// bus.start().await?;
///
/// let event = bus
///     .publish(EventDraft::new("order.created", "orders", json!({"orderId": "42"})))
///     .await?;
/// ```
pub struct EventBus {
    store: Arc<dyn EventStore>,
    transport: Arc<dyn Transport>,
    ledger: Arc<dyn RetryLedger>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    state: watch::Sender<BusState>,
    // Serializes start, stop and listen-set changes.
    lifecycle: Mutex<()>,
    config: EventBusConfig,
}

impl EventBus {
    /// Creates a stopped bus with the default configuration.
    pub fn new(
        store: Arc<dyn EventStore>,
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn RetryLedger>,
    ) -> Self {
        Self::with_config(store, transport, ledger, EventBusConfig::default())
    }

    /// Creates a stopped bus.
    pub fn with_config(
        store: Arc<dyn EventStore>,
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn RetryLedger>,
        config: EventBusConfig,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (state, state_rx) = watch::channel(BusState::Stopped);
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            ledger.clone(),
            state_rx,
            config.handler_timeout,
        ));

        Self {
            store,
            transport,
            ledger,
            registry,
            dispatcher,
            state,
            lifecycle: Mutex::new(()),
            config,
        }
    }

    // === Lifecycle ===

    /// Current lifecycle state.
    pub fn state(&self) -> BusState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Opens the transport session and listens on the channel of every type
    /// subscribed so far. A no-op when already running.
    ///
    /// On failure the bus falls back to `Stopped`.
    pub async fn start(&self) -> Result<(), BusError> {
        let _guard = self.lifecycle.lock().await;
        if self.is_running() {
            return Ok(());
        }

        self.transition(BusState::Starting)?;
        if let Err(e) = self.open_transport().await {
            error!(error = %e, "Event bus failed to start");
            self.transition(BusState::Stopped)?;
            return Err(e);
        }
        self.transition(BusState::Running)?;

        info!(
            channel_prefix = %self.config.channel_prefix,
            event_types = self.registry.event_types().len(),
            "Event bus started"
        );
        Ok(())
    }

    /// Closes the transport session. Idempotent once stopped.
    ///
    /// Subscriptions survive a stop and are listened on again by the next
    /// `start`.
    pub async fn stop(&self) -> Result<(), BusError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == BusState::Stopped {
            return Ok(());
        }

        self.transition(BusState::Stopping)?;
        if let Err(e) = self.transport.stop().await {
            warn!(error = %e, "Transport did not stop cleanly");
        }
        self.transition(BusState::Stopped)?;

        info!("Event bus stopped");
        Ok(())
    }

    async fn open_transport(&self) -> Result<(), BusError> {
        let sink: Arc<dyn MessageSink> = self.dispatcher.clone();
        self.transport.start(sink).await?;

        let channels: Vec<String> = self
            .registry
            .event_types()
            .iter()
            .map(|event_type| self.channel(event_type))
            .collect();
        if channels.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.transport.listen(&channels).await {
            if let Err(stop_err) = self.transport.stop().await {
                warn!(error = %stop_err, "Transport did not stop after failed listen");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn transition(&self, to: BusState) -> Result<(), BusError> {
        let from = self.state();
        let next = from
            .transition_to(to)
            .map_err(|_| BusError::InvalidTransition { from, to })?;
        self.state.send_replace(next);
        debug!(from = %from, to = %next, "Bus state changed");
        Ok(())
    }

    // === Publish ===

    /// Enriches, persists and transmits an event.
    ///
    /// Returns the enriched event once the transport has accepted it.
    /// Fails with [`BusError::NotRunning`] before any I/O when the bus is not
    /// running. A failed primary persistence aborts before transmission.
    #[instrument(skip_all, fields(event_type = %draft.event_type, source = %draft.source))]
    pub async fn publish(&self, draft: EventDraft) -> Result<DomainEvent, BusError> {
        if !self.is_running() {
            return Err(BusError::NotRunning);
        }

        let event = draft.enrich(&self.config.default_version)?;
        let message = event
            .to_json()
            .map_err(|e| BusError::Serialization(e.to_string()))?;

        self.store.persist(&event).await?;
        self.transmit(&event, &message).await?;

        debug!(event_id = %event.id(), "Event published");
        Ok(event)
    }

    /// Re-transmits a stored event on its type channel.
    ///
    /// The event goes out exactly as stored: it is neither enriched nor
    /// persisted again. Returns `Ok(false)` when the id is unknown or
    /// expired.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn replay(&self, event_id: &EventId) -> Result<bool, BusError> {
        if !self.is_running() {
            return Err(BusError::NotRunning);
        }

        let Some(event) = self.store.get(event_id).await? else {
            debug!("Nothing to replay");
            return Ok(false);
        };
        let message = event
            .to_json()
            .map_err(|e| BusError::Serialization(e.to_string()))?;
        self.transmit(&event, &message).await?;

        info!(event_type = %event.event_type(), "Event replayed");
        Ok(true)
    }

    async fn transmit(&self, event: &DomainEvent, message: &str) -> Result<(), BusError> {
        let channel = self.channel(event.event_type());
        self.transport
            .publish(&channel, message)
            .await
            .map_err(|e| {
                error!(
                    event_id = %event.id(),
                    channel = %channel,
                    error = %e,
                    "Transport rejected event"
                );
                BusError::from(e)
            })
    }

    // === Subscriptions ===

    /// Subscribes `handler` to `event_type` under `handler_id`.
    ///
    /// Idempotent per (type, handler id). The first subscriber of a type
    /// starts listening on its channel when the bus is running; if that
    /// fails the subscription is rolled back.
    pub async fn subscribe(
        &self,
        event_type: &str,
        handler_id: HandlerId,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Subscribed, BusError> {
        if event_type.trim().is_empty() {
            return Err(ValidationError::empty_field("event_type").into());
        }

        let _guard = self.lifecycle.lock().await;
        let outcome = self
            .registry
            .subscribe(event_type, handler_id.clone(), handler);

        if outcome == Subscribed::NewType && self.is_running() {
            let channels = [self.channel(event_type)];
            if let Err(e) = self.transport.listen(&channels).await {
                self.registry.unsubscribe(event_type, &handler_id);
                error!(
                    event_type = %event_type,
                    handler_id = %handler_id,
                    error = %e,
                    "Could not listen on new event type"
                );
                return Err(e.into());
            }
        }

        debug!(
            event_type = %event_type,
            handler_id = %handler_id,
            outcome = ?outcome,
            "Handler subscribed"
        );
        Ok(outcome)
    }

    /// Removes a handler. When it was the last for its type, the type's
    /// channel is no longer listened on.
    pub async fn unsubscribe(&self, event_type: &str, handler_id: &HandlerId) -> Unsubscribed {
        let _guard = self.lifecycle.lock().await;
        let outcome = self.registry.unsubscribe(event_type, handler_id);

        if outcome == Unsubscribed::TypeRemoved && self.is_running() {
            let channels = [self.channel(event_type)];
            if let Err(e) = self.transport.unlisten(&channels).await {
                warn!(event_type = %event_type, error = %e, "Could not stop listening");
            }
        }

        debug!(
            event_type = %event_type,
            handler_id = %handler_id,
            outcome = ?outcome,
            "Handler unsubscribed"
        );
        outcome
    }

    /// The registry backing this bus.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // === Queries ===

    pub async fn get_event(&self, event_id: &EventId) -> Result<Option<DomainEvent>, BusError> {
        Ok(self.store.get(event_id).await?)
    }

    /// Up to `limit` most recent events of a type, newest first.
    pub async fn events_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, BusError> {
        Ok(self.store.get_by_type(event_type, limit).await?)
    }

    /// Every event of a correlation chain, oldest first.
    pub async fn events_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<DomainEvent>, BusError> {
        Ok(self.store.get_by_correlation_id(correlation_id).await?)
    }

    /// Up to `limit` events of a source stream, in append order.
    pub async fn stream(&self, source: &str, limit: usize) -> Result<Vec<DomainEvent>, BusError> {
        Ok(self.store.read_stream(source, limit).await?)
    }

    /// Live retry records for an event, ordered by handler id.
    pub async fn retry_records(&self, event_id: &EventId) -> Result<Vec<RetryRecord>, BusError> {
        Ok(self.ledger.list_for_event(event_id).await?)
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            running: self.is_running(),
            handler_count: self.registry.handler_count(),
            event_types: self.registry.event_types(),
            transport_connected: self.transport.is_connected(),
        }
    }

    /// Store liveness. Never fails.
    pub async fn health(&self) -> bool {
        self.store.health().await
    }

    fn channel(&self, event_type: &str) -> String {
        channel_for(&self.config.channel_prefix, event_type)
    }
}
