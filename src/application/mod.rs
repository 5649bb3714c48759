//! Application layer - the bus itself.
//!
//! Coordinates the ports: the [`SubscriptionRegistry`] maps types to
//! handlers, the [`Dispatcher`] fans inbound messages out to them, and the
//! [`EventBus`] owns the lifecycle and the publish path.

mod dispatcher;
mod error;
mod event_bus;
mod subscription_registry;

pub use dispatcher::{DeliveryReport, Dispatcher, HandlerOutcome};
pub use error::BusError;
pub use event_bus::{EventBus, EventBusConfig, DEFAULT_HANDLER_TIMEOUT};
pub use subscription_registry::{Subscribed, Subscription, SubscriptionRegistry, Unsubscribed};
