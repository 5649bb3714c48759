//! Redis pub/sub transport.
//!
//! One pattern subscription (`<prefix>:*`) is opened at start and never
//! changed; the listened set is applied locally to each incoming message.
//! Listening on a new type therefore never resubscribes and cannot drop
//! messages already in flight on other channels.
//!
//! Redis pub/sub is at-most-once per connected subscriber and FIFO per
//! connection, but each message is dispatched on its own task, so handlers
//! may observe messages of one channel out of order.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::listened::ListenedChannels;
use crate::config::RedisConfig;
use crate::domain::events::channel::channel_pattern;
use crate::ports::{MessageSink, Transport, TransportError};

/// Redis-backed [`Transport`].
pub struct RedisTransport {
    client: Client,
    pattern: String,
    connect_timeout: Duration,
    publisher: Mutex<Option<ConnectionManager>>,
    listened: Arc<ListenedChannels>,
    connected: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RedisTransport {
    /// Prepares a transport for channels under `channel_prefix`. No
    /// connection is made until [`Transport::start`].
    pub fn new(config: &RedisConfig, channel_prefix: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::open(config.pubsub_url())?,
            pattern: channel_pattern(channel_prefix),
            connect_timeout: config.timeout(),
            publisher: Mutex::new(None),
            listened: Arc::new(ListenedChannels::new()),
            connected: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
        })
    }

    fn timed_out(&self, what: &str) -> TransportError {
        TransportError::Connection(format!(
            "{} timed out after {}s",
            what,
            self.connect_timeout.as_secs()
        ))
    }

    fn is_started(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for RedisTransport {
    fn drop(&mut self) {
        if let Some(handle) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn start(&self, sink: Arc<dyn MessageSink>) -> Result<(), TransportError> {
        if self.is_started() {
            return Ok(());
        }

        let publisher = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        .map_err(|_| self.timed_out("publisher connection"))??;

        let mut pubsub = tokio::time::timeout(self.connect_timeout, self.client.get_async_pubsub())
            .await
            .map_err(|_| self.timed_out("pub/sub connection"))??;
        pubsub.psubscribe(&self.pattern).await?;

        let messages = pubsub.into_on_message().map(|msg| {
            let channel = msg.get_channel_name().to_string();
            (channel, msg.get_payload::<String>())
        });

        *self.publisher.lock().unwrap_or_else(PoisonError::into_inner) = Some(publisher);
        let handle = spawn_listener(
            messages,
            self.listened.clone(),
            sink,
            self.connected.clone(),
        );
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(pattern = %self.pattern, "Redis transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.listened.clear();

        debug!("Redis transport stopped");
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), TransportError> {
        let publisher = self
            .publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(mut conn) = publisher.filter(|_| self.is_connected()) else {
            return Err(TransportError::NotConnected);
        };

        let receivers: i64 = conn
            .publish(channel, message)
            .await
            .map_err(|e| TransportError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        debug!(channel = %channel, receivers, "Published to Redis");
        Ok(())
    }

    async fn listen(&self, channels: &[String]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.listened.add(channels);
        Ok(())
    }

    async fn unlisten(&self, channels: &[String]) -> Result<(), TransportError> {
        self.listened.remove(channels);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Marks the transport connected, then forwards every message on a listened
/// channel to `sink` on its own task until the stream ends.
///
/// The flag is raised before the task exists so an immediately ending stream
/// always leaves it lowered.
fn spawn_listener<S>(
    messages: S,
    listened: Arc<ListenedChannels>,
    sink: Arc<dyn MessageSink>,
    connected: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: Stream<Item = (String, Result<String, RedisError>)> + Send + 'static,
{
    connected.store(true, Ordering::SeqCst);
    tokio::spawn(async move {
        futures::pin_mut!(messages);
        while let Some((channel, payload)) = messages.next().await {
            if !listened.contains(&channel) {
                continue;
            }
            match payload {
                Ok(raw) => {
                    let sink = sink.clone();
                    tokio::spawn(async move { sink.deliver(&channel, &raw).await });
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Dropping non-text pub/sub payload");
                }
            }
        }
        connected.store(false, Ordering::SeqCst);
        warn!("Redis pub/sub stream ended");
    })
}
