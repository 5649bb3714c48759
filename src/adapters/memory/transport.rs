//! In-memory transport over a tokio broadcast channel.
//!
//! Transports created with [`InMemoryTransport::peer`] share one broadcast
//! channel, so several buses in one process behave like several processes
//! on one pub/sub server. Every message is handed to the sink on its own
//! task; delivery order across messages is therefore not guaranteed.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapters::listened::ListenedChannels;
use crate::ports::{MessageSink, Transport, TransportError};

const CHANNEL_CAPACITY: usize = 1024;

type Message = (String, String);

/// In-memory [`Transport`].
pub struct InMemoryTransport {
    hub: broadcast::Sender<Message>,
    listened: Arc<ListenedChannels>,
    published: Mutex<Vec<Message>>,
    connected: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    fail_start: AtomicBool,
    fail_publish: AtomicBool,
    fail_listen: AtomicBool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let (hub, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self::on_hub(hub)
    }

    fn on_hub(hub: broadcast::Sender<Message>) -> Self {
        Self {
            hub,
            listened: Arc::new(ListenedChannels::new()),
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            listener: Mutex::new(None),
            fail_start: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            fail_listen: AtomicBool::new(false),
        }
    }

    /// A separate transport attached to the same broadcast channel.
    pub fn peer(&self) -> Self {
        Self::on_hub(self.hub.clone())
    }

    // === Test Helpers ===

    /// Every `(channel, message)` this transport accepted for publishing.
    pub fn published_messages(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sorted list of channels currently listened on.
    pub fn listened_channels(&self) -> Vec<String> {
        self.listened.snapshot()
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_listen(&self, fail: bool) {
        self.fail_listen.store(fail, Ordering::SeqCst);
    }

    /// Injects a raw message as if another process had published it.
    pub fn inject(&self, channel: &str, raw: &str) {
        let _ = self.hub.send((channel.to_string(), raw.to_string()));
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryTransport {
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
impl Transport for InMemoryTransport {
    async fn start(&self, sink: Arc<dyn MessageSink>) -> Result<(), TransportError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".into()));
        }

        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return Ok(());
        }

        let mut rx = self.hub.subscribe();
        let listened = self.listened.clone();
        *listener = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok((channel, raw)) => {
                        if !listened.contains(&channel) {
                            continue;
                        }
                        let sink = sink.clone();
                        tokio::spawn(async move { sink.deliver(&channel, &raw).await });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "In-memory transport listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        self.connected.store(true, Ordering::SeqCst);
        debug!("In-memory transport started");
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
        self.listened.clear();
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish {
                channel: channel.to_string(),
                reason: "injected failure".into(),
            });
        }

        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel.to_string(), message.to_string()));
        // No receivers is not an error, same as PUBLISH reaching zero clients.
        let _ = self.hub.send((channel.to_string(), message.to_string()));
        Ok(())
    }

    async fn listen(&self, channels: &[String]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.fail_listen.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("listen rejected".into()));
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ForwardingSink(mpsc::UnboundedSender<Message>);

    #[async_trait]
    impl MessageSink for ForwardingSink {
        async fn deliver(&self, channel: &str, raw: &str) {
            let _ = self.0.send((channel.to_string(), raw.to_string()));
        }
    }

    fn sink() -> (Arc<dyn MessageSink>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ForwardingSink(tx)), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<Message> {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn publish_while_stopped_fails_fast() {
        let transport = InMemoryTransport::new();
        let err = transport.publish("events:a", "{}").await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
        assert!(transport.published_messages().is_empty());
    }

    #[tokio::test]
    async fn delivers_only_listened_channels() {
        let transport = InMemoryTransport::new();
        let (sink, mut rx) = sink();
        transport.start(sink).await.unwrap();
        transport.listen(&["events:a".to_string()]).await.unwrap();

        transport.publish("events:b", "ignored").await.unwrap();
        transport.publish("events:a", "wanted").await.unwrap();

        assert_eq!(
            next(&mut rx).await,
            Some(("events:a".to_string(), "wanted".to_string()))
        );
        assert!(next(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn unlisten_stops_delivery() {
        let transport = InMemoryTransport::new();
        let (sink, mut rx) = sink();
        transport.start(sink).await.unwrap();
        transport.listen(&["events:a".to_string()]).await.unwrap();
        transport.unlisten(&["events:a".to_string()]).await.unwrap();

        transport.publish("events:a", "x").await.unwrap();

        assert!(next(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn peers_share_messages() {
        let publisher = InMemoryTransport::new();
        let subscriber = publisher.peer();
        let (subscriber_sink, mut rx) = sink();
        let (publisher_sink, _publisher_rx) = sink();
        publisher.start(publisher_sink).await.unwrap();
        subscriber.start(subscriber_sink).await.unwrap();
        subscriber.listen(&["events:a".to_string()]).await.unwrap();

        publisher.publish("events:a", "hello").await.unwrap();

        assert_eq!(next(&mut rx).await.map(|(_, raw)| raw), Some("hello".to_string()));
        assert!(subscriber.published_messages().is_empty());
    }

    #[tokio::test]
    async fn stop_disconnects_and_clears_listened_set() {
        let transport = InMemoryTransport::new();
        let (sink, _rx) = sink();
        transport.start(sink).await.unwrap();
        transport.listen(&["events:a".to_string()]).await.unwrap();

        transport.stop().await.unwrap();

        assert!(!transport.is_connected());
        assert!(transport.listened_channels().is_empty());
        transport.stop().await.unwrap();
    }
}
