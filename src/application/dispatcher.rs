//! Dispatcher - fan-out of inbound messages to subscribed handlers.
//!
//! This is the delivery half of the dispatch engine. The transport calls
//! [`MessageSink::deliver`] for every message on a listened channel; the
//! dispatcher then:
//!
//! 1. Parses the raw message into a `DomainEvent` (unparseable or invalid
//!    envelopes are logged with a truncated preview and dropped)
//! 2. Takes a snapshot of the handlers subscribed to the event's type
//! 3. Spawns one task per handler and waits for all of them to settle,
//!    never short-circuiting on the first failure
//! 4. Records each failure (error, timeout or panic) in the retry ledger
//!
//! Handler failures never propagate to the transport, to sibling handlers,
//! or to later deliveries. Duplicate deliveries of one event id are not
//! deduplicated here.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::domain::events::{BusState, DomainEvent, RetryRecord};
use crate::domain::foundation::{DomainError, ErrorCode, EventId, HandlerId};
use crate::ports::{MessageSink, RetryLedger};

use super::subscription_registry::{Subscription, SubscriptionRegistry};

/// Maximum characters of a dropped message kept in the log line.
const PREVIEW_CHARS: usize = 200;

/// Settled result of one handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub handler_id: HandlerId,
    pub elapsed: Duration,
    pub result: Result<(), DomainError>,
}

impl HandlerOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-handler outcomes of one delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub event_id: EventId,
    pub event_type: String,
    pub outcomes: Vec<HandlerOutcome>,
}

impl DeliveryReport {
    /// Handler ids that processed the event successfully.
    pub fn succeeded(&self) -> Vec<&HandlerId> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| &o.handler_id)
            .collect()
    }

    /// Handler ids that failed, timed out or panicked.
    pub fn failed(&self) -> Vec<&HandlerId> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| &o.handler_id)
            .collect()
    }
}

/// Concurrent, failure-isolating fan-out of delivered events.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    ledger: Arc<dyn RetryLedger>,
    state: watch::Receiver<BusState>,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// `handler_timeout` bounds every invocation; `None` lets handlers run
    /// unbounded.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        ledger: Arc<dyn RetryLedger>,
        state: watch::Receiver<BusState>,
        handler_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            ledger,
            state,
            handler_timeout,
        }
    }

    /// Delivers one raw message and returns what each handler did.
    ///
    /// Returns `None` when the message was dropped before fan-out (bus not
    /// running, unparseable or invalid envelope).
    pub async fn dispatch(&self, channel: &str, raw: &str) -> Option<DeliveryReport> {
        if !self.state.borrow().is_running() {
            debug!(channel = %channel, "Bus not running; dropping inbound message");
            return None;
        }

        let event = match DomainEvent::from_json(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    channel = %channel,
                    error = %e,
                    preview = preview(raw),
                    "Dropping unparseable message"
                );
                return None;
            }
        };
        if let Err(e) = event.validate() {
            warn!(
                channel = %channel,
                error = %e,
                preview = preview(raw),
                "Dropping message with invalid envelope"
            );
            return None;
        }

        Some(self.fan_out(event).await)
    }

    /// Invokes every handler subscribed to the event's type concurrently and
    /// waits until all of them have settled.
    pub async fn fan_out(&self, event: DomainEvent) -> DeliveryReport {
        let subscriptions = self.registry.handlers_for(event.event_type());
        let mut report = DeliveryReport {
            event_id: event.id().clone(),
            event_type: event.event_type().to_string(),
            outcomes: Vec::with_capacity(subscriptions.len()),
        };

        if subscriptions.is_empty() {
            debug!(
                event_id = %event.id(),
                event_type = %event.event_type(),
                handler_count = 0,
                "No handlers subscribed"
            );
            return report;
        }

        debug!(
            event_id = %event.id(),
            event_type = %event.event_type(),
            handler_count = subscriptions.len(),
            "Dispatching event"
        );

        let mut tasks = JoinSet::new();
        for subscription in subscriptions {
            tasks.spawn(invoke(subscription, event.clone(), self.handler_timeout));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    self.settle(&event, &outcome).await;
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    // Only reachable if the runtime cancels the task.
                    error!(event_id = %event.id(), error = %e, "Handler task aborted");
                }
            }
        }

        report
    }

    async fn settle(&self, event: &DomainEvent, outcome: &HandlerOutcome) {
        let elapsed_ms = outcome.elapsed.as_millis() as u64;
        match &outcome.result {
            Ok(()) => {
                debug!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    handler_id = %outcome.handler_id,
                    elapsed_ms,
                    "Handler processed event"
                );
            }
            Err(e) => {
                error!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    handler_id = %outcome.handler_id,
                    elapsed_ms,
                    error = %e,
                    details = ?e.details,
                    "Handler failed"
                );
                let record =
                    RetryRecord::new(event.id().clone(), outcome.handler_id.clone(), e.to_string());
                if let Err(ledger_err) = self.ledger.record(&record).await {
                    error!(
                        event_id = %event.id(),
                        handler_id = %outcome.handler_id,
                        error = %ledger_err,
                        "Failed to write retry record"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl MessageSink for Dispatcher {
    async fn deliver(&self, channel: &str, raw: &str) {
        let _ = self.dispatch(channel, raw).await;
    }
}

async fn invoke(
    subscription: Subscription,
    event: DomainEvent,
    deadline: Option<Duration>,
) -> HandlerOutcome {
    let Subscription {
        handler_id,
        handler,
    } = subscription;
    let started = Instant::now();
    let call = AssertUnwindSafe(handler.handle(event)).catch_unwind();

    let settled = match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, call).await {
            Ok(settled) => settled,
            Err(_) => {
                return HandlerOutcome {
                    handler_id,
                    elapsed: started.elapsed(),
                    result: Err(DomainError::new(
                        ErrorCode::HandlerTimedOut,
                        format!("handler timed out after {}ms", deadline.as_millis()),
                    )),
                };
            }
        },
        None => call.await,
    };

    let result = match settled {
        Ok(result) => result,
        Err(panic) => Err(DomainError::new(
            ErrorCode::HandlerPanicked,
            format!("handler panicked: {}", panic_message(panic.as_ref())),
        )),
    };

    HandlerOutcome {
        handler_id,
        elapsed: started.elapsed(),
        result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
