//! Push channels from the playground server.
//!
//! A [`Connector`] opens a channel by path and hands back a [`Subscription`]
//! that yields one [`Delivery`] per payload line. Closing a subscription stops
//! delivery immediately, even if payloads are still buffered.

use crate::error::ClientError;
use crate::protocol::split_frame;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Buffered payloads per channel before the reader applies backpressure.
const CHANNEL_CAPACITY: usize = 256;

/// How long a client-side close waits for the Close frame to go out.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One item delivered by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A single encoded payload line
    Message(String),
    /// The channel ended without the client closing it
    Closed { reason: Option<String> },
}

/// An open channel.
pub struct Subscription {
    address: String,
    rx: mpsc::Receiver<Delivery>,
    reader: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    finished: bool,
}

impl Subscription {
    pub fn new(
        address: impl Into<String>,
        rx: mpsc::Receiver<Delivery>,
        reader: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            address: address.into(),
            rx,
            reader,
            shutdown: None,
            finished: false,
        }
    }

    /// Let the reader end the connection itself on close instead of being
    /// aborted.
    pub fn with_shutdown(mut self, shutdown: oneshot::Sender<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the channel has ended or was closed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next delivery.
    ///
    /// Yields exactly one `Closed` when the remote side goes away, then
    /// `None` forever. After [`close`](Self::close) it yields `None` at once.
    pub async fn recv(&mut self) -> Option<Delivery> {
        if self.finished {
            return None;
        }
        let delivery = self
            .rx
            .recv()
            .await
            .unwrap_or(Delivery::Closed { reason: None });
        if matches!(delivery, Delivery::Closed { .. }) {
            self.finished = true;
            self.reader = None;
            self.shutdown = None;
        }
        Some(delivery)
    }

    /// Close the channel; no further deliveries are yielded.
    pub fn close(&mut self) {
        self.finished = true;
        self.rx.close();
        self.stop_reader();
    }

    fn stop_reader(&mut self) {
        let reader = self.reader.take();
        match self.shutdown.take() {
            // The reader sends a Close frame and exits on its own.
            Some(shutdown) => {
                let _ = shutdown.send(());
            }
            None => {
                if let Some(reader) = reader {
                    reader.abort();
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

/// Something that can open a push channel by path.
pub trait Connector {
    fn open(&self, path: &str) -> impl Future<Output = Result<Subscription, ClientError>>;
}

/// WebSocket connector for a playground server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base: Url,
}

impl WsConnector {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Full address of a channel path on this server.
    pub fn address(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }
}

impl Connector for WsConnector {
    async fn open(&self, path: &str) -> Result<Subscription, ClientError> {
        let address = self.address(path);
        tracing::debug!("Opening channel {}", address);

        let (ws, _) = tokio_tungstenite::connect_async(address.as_str())
            .await
            .map_err(|e| ClientError::from_tungstenite(&address, e))?;
        let (sink, stream) = ws.split();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader_address = address.clone();
        let reader = tokio::spawn(async move {
            run_reader(stream, sink, tx, shutdown_rx).await;
            tracing::debug!("Channel {} reader finished", reader_address);
        });

        Ok(Subscription::new(address, rx, Some(reader)).with_shutdown(shutdown_tx))
    }
}

/// Pump frames until the server ends the socket or the client shuts it down.
/// A client-side shutdown sends a Close frame before returning.
async fn run_reader<St, Si>(
    stream: St,
    mut sink: Si,
    tx: mpsc::Sender<Delivery>,
    shutdown: oneshot::Receiver<()>,
) where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    Si: Sink<Message> + Unpin,
    Si::Error: std::fmt::Display,
{
    let client_closed = tokio::select! {
        biased;
        _ = shutdown => true,
        remote_ended = pump_frames(stream, tx) => !remote_ended,
    };
    if !client_closed {
        return;
    }
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Could not send close frame: {}", e),
        Err(_) => tracing::debug!("Timed out sending close frame"),
    }
}

/// Forward text frames line by line until the socket ends.
///
/// Returns false if the subscriber went away first.
async fn pump_frames<S>(mut stream: S, tx: mpsc::Sender<Delivery>) -> bool
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                for line in split_frame(text.as_str()) {
                    if tx.send(Delivery::Message(line.to_string())).await.is_err() {
                        return false;
                    }
                }
            }
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| f.reason.as_str().to_string())
                    .filter(|r| !r.is_empty());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        }
    };
    let _ = tx.send(Delivery::Closed { reason }).await;
    true
}

/// In-process connector: each `open(path)` takes the next feed prepared with
/// [`MemoryConnector::route`].
#[derive(Clone, Default)]
pub struct MemoryConnector {
    routes: Arc<Mutex<HashMap<String, VecDeque<mpsc::Receiver<Delivery>>>>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare a channel for the next `open(path)` and return its sending side.
    pub fn route(&self, path: &str) -> MemoryFeed {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        match self.routes.lock() {
            Ok(mut routes) => routes.entry(path.to_string()).or_default().push_back(rx),
            Err(e) => tracing::warn!("Memory routes lock poisoned: {e}"),
        }
        MemoryFeed { tx }
    }

    /// Paths opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Connector for MemoryConnector {
    async fn open(&self, path: &str) -> Result<Subscription, ClientError> {
        let rx = self
            .routes
            .lock()
            .map_err(|e| anyhow::anyhow!("memory routes lock poisoned: {e}"))?
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ClientError::Unavailable(path.to_string()))?;

        if let Ok(mut opened) = self.opened.lock() {
            opened.push(path.to_string());
        }
        Ok(Subscription::new(path, rx, None))
    }
}

/// Sending side of a [`MemoryConnector`] channel.
#[derive(Clone)]
pub struct MemoryFeed {
    tx: mpsc::Sender<Delivery>,
}

impl MemoryFeed {
    /// Queue one payload line. Returns false if the subscription is gone.
    pub fn push(&self, payload: impl Into<String>) -> bool {
        self.tx.try_send(Delivery::Message(payload.into())).is_ok()
    }

    /// End the channel as the server would.
    pub fn close(&self, reason: Option<&str>) -> bool {
        self.tx
            .try_send(Delivery::Closed {
                reason: reason.map(str::to_string),
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_channel_delivers_in_order() {
        let connector = MemoryConnector::new();
        let feed = connector.route("/watch_list");
        let mut sub = connector.open("/watch_list").await.unwrap();

        assert!(feed.push("one"));
        assert!(feed.push("two"));
        assert_eq!(sub.recv().await, Some(Delivery::Message("one".into())));
        assert_eq!(sub.recv().await, Some(Delivery::Message("two".into())));
        assert_eq!(connector.opened(), vec!["/watch_list".to_string()]);
    }

    #[tokio::test]
    async fn test_unrouted_path_is_unavailable() {
        let connector = MemoryConnector::new();
        let result = connector.open("/observe/1").await;
        assert!(matches!(result, Err(ClientError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_close_discards_buffered_payloads() {
        let connector = MemoryConnector::new();
        let feed = connector.route("/watch_list");
        let mut sub = connector.open("/watch_list").await.unwrap();

        feed.push("buffered");
        sub.close();
        assert!(sub.is_finished());
        assert_eq!(sub.recv().await, None);
        assert!(!feed.push("after close"));
    }

    #[tokio::test]
    async fn test_dropped_feed_yields_single_closed() {
        let connector = MemoryConnector::new();
        let feed = connector.route("/watch_list");
        let mut sub = connector.open("/watch_list").await.unwrap();

        drop(feed);
        assert_eq!(sub.recv().await, Some(Delivery::Closed { reason: None }));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_pump_frames_splits_lines_and_reports_close() {
        let frames = futures::stream::iter(vec![
            Ok::<_, tokio_tungstenite::tungstenite::Error>(Message::Text(
                "{\"a\":1}\n{\"b\":2}".into(),
            )),
            Ok(Message::Binary(vec![1u8, 2, 3].into())),
            Ok(Message::Text("{\"c\":3}".into())),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        pump_frames(frames, tx).await;

        assert_eq!(rx.recv().await, Some(Delivery::Message("{\"a\":1}".into())));
        assert_eq!(rx.recv().await, Some(Delivery::Message("{\"b\":2}".into())));
        assert_eq!(rx.recv().await, Some(Delivery::Message("{\"c\":3}".into())));
        assert_eq!(rx.recv().await, Some(Delivery::Closed { reason: None }));
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let (sink, mut sent) = futures::channel::mpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let frames =
            futures::stream::pending::<Result<Message, tokio_tungstenite::tungstenite::Error>>();
        let reader = tokio::spawn(run_reader(frames, sink, tx, shutdown_rx));

        let mut sub = Subscription::new("ws://localhost/watch_list", rx, Some(reader))
            .with_shutdown(shutdown_tx);
        sub.close();

        assert_eq!(sent.next().await, Some(Message::Close(None)));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropping_subscription_sends_close_frame() {
        let (sink, mut sent) = futures::channel::mpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let frames =
            futures::stream::pending::<Result<Message, tokio_tungstenite::tungstenite::Error>>();
        let reader = tokio::spawn(run_reader(frames, sink, tx, shutdown_rx));

        let sub = Subscription::new("ws://localhost/watch_list", rx, Some(reader))
            .with_shutdown(shutdown_tx);
        drop(sub);

        assert_eq!(sent.next().await, Some(Message::Close(None)));
    }

    #[tokio::test]
    async fn test_server_close_sends_nothing_back() {
        let (sink, mut sent) = futures::channel::mpsc::unbounded::<Message>();
        let (tx, mut rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let frames = futures::stream::iter(vec![Ok::<_, tokio_tungstenite::tungstenite::Error>(
            Message::Text("{\"a\":1}".into()),
        )]);

        run_reader(frames, sink, tx, shutdown_rx).await;

        assert_eq!(rx.recv().await, Some(Delivery::Message("{\"a\":1}".into())));
        assert_eq!(rx.recv().await, Some(Delivery::Closed { reason: None }));
        assert_eq!(sent.next().await, None);
    }

    #[test]
    fn test_ws_address_joins_base_and_path() {
        let connector = WsConnector::new(Url::parse("ws://localhost:3001/").unwrap());
        assert_eq!(
            connector.address("/watch_list"),
            "ws://localhost:3001/watch_list"
        );
    }
}
