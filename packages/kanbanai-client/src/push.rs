/// Push channel: a standing WebSocket that announces server-side changes.
///
/// One supervisor task owns the connection and the only reconnect timer.
/// Whenever the connection cannot be opened or closes for any reason the
/// channel goes `Offline`, waits the fixed reconnect delay, and tries again,
/// forever. Errors never leave this module; they only produce a connectivity
/// transition and a log line.
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use kanbanai_core::sync::{Connectivity, PushMessage};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Messages from one open connection. The stream ends when the connection
/// closes; an `Err` item means the transport failed.
pub type PushStream = BoxStream<'static, Result<PushMessage, ChannelError>>;

#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
    async fn open(&self) -> Result<PushStream, ChannelError>;
}

/// Connector for the server's `/ws` endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn open(&self) -> Result<PushStream, ChannelError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        log::info!("[push] Connected to {}", self.url);

        let messages = stream::unfold(ws, |mut ws| async move {
            loop {
                let frame = match ws.next().await? {
                    Ok(frame) => frame,
                    Err(e) => return Some((Err(ChannelError::Transport(e.to_string())), ws)),
                };
                match frame {
                    Message::Text(text) => match PushMessage::parse(&text) {
                        Ok(message) => return Some((Ok(message), ws)),
                        Err(e) => log::warn!("[push] Ignoring unparseable message: {}", e),
                    },
                    Message::Ping(data) => {
                        let _ = ws.send(Message::Pong(data)).await;
                    }
                    Message::Close(_) => return None,
                    _ => {}
                }
            }
        });
        Ok(messages.boxed())
    }
}

pub struct PushChannel {
    connector: Arc<dyn PushConnector>,
    reconnect_delay: Duration,
    messages: broadcast::Sender<PushMessage>,
    connectivity: watch::Sender<Connectivity>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl PushChannel {
    pub fn new(connector: impl PushConnector, reconnect_delay: Duration) -> Self {
        let (messages, _) = broadcast::channel(64);
        let (connectivity, _) = watch::channel(Connectivity::Offline);
        Self {
            connector: Arc::new(connector),
            reconnect_delay,
            messages,
            connectivity,
            supervisor: Mutex::new(None),
        }
    }

    /// Start the connection loop. A no-op while it is already running, so
    /// there is never more than one reconnect timer.
    pub fn connect(&self) {
        let mut supervisor = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);
        if supervisor.as_ref().map_or(false, |task| !task.is_finished()) {
            log::debug!("[push] Already running");
            return;
        }
        *supervisor = Some(tokio::spawn(supervise(
            self.connector.clone(),
            self.reconnect_delay,
            self.messages.clone(),
            self.connectivity.clone(),
        )));
    }

    /// Receive change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.messages.subscribe()
    }

    /// Observe Online/Offline transitions.
    pub fn connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.subscribe()
    }

    /// Stop the connection loop for good (logout).
    pub fn close(&self) {
        let task = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            log::info!("[push] Closed");
        }
        set_connectivity(&self.connectivity, Connectivity::Offline);
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        if let Ok(mut supervisor) = self.supervisor.lock() {
            if let Some(task) = supervisor.take() {
                task.abort();
            }
        }
    }
}

fn set_connectivity(tx: &watch::Sender<Connectivity>, next: Connectivity) {
    tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

async fn supervise(
    connector: Arc<dyn PushConnector>,
    reconnect_delay: Duration,
    messages: broadcast::Sender<PushMessage>,
    connectivity: watch::Sender<Connectivity>,
) {
    loop {
        match connector.open().await {
            Ok(mut stream) => {
                set_connectivity(&connectivity, Connectivity::Online);
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(message) => {
                            // No subscribers is fine; nobody is listening yet.
                            let _ = messages.send(message);
                        }
                        Err(e) => {
                            log::warn!("[push] {}", e);
                            break;
                        }
                    }
                }
                log::info!("[push] Connection closed");
            }
            Err(e) => log::warn!("[push] {}", e),
        }
        set_connectivity(&connectivity, Connectivity::Offline);
        log::info!("[push] Reconnecting in {:?}", reconnect_delay);
        tokio::time::sleep(reconnect_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Hands out pre-arranged connection outcomes; fails once they run out.
    struct ScriptedConnector {
        outcomes: Mutex<VecDeque<Result<PushStream, ChannelError>>>,
        attempts: Arc<AtomicUsize>,
    }

    impl ScriptedConnector {
        fn new(outcomes: Vec<Result<PushStream, ChannelError>>) -> (Self, Arc<AtomicUsize>) {
            let attempts = Arc::new(AtomicUsize::new(0));
            let connector = Self {
                outcomes: Mutex::new(outcomes.into()),
                attempts: attempts.clone(),
            };
            (connector, attempts)
        }
    }

    #[async_trait]
    impl PushConnector for ScriptedConnector {
        async fn open(&self) -> Result<PushStream, ChannelError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChannelError::Connect("refused".to_string())))
        }
    }

    /// A connection the test controls: send to push, drop the sender to close.
    fn live_stream() -> (mpsc::UnboundedSender<Result<PushMessage, ChannelError>>, PushStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|m| (m, rx)) });
        (tx, stream.boxed())
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_messages_and_tracks_connectivity() {
        let (tx, stream) = live_stream();
        let (connector, _) = ScriptedConnector::new(vec![Ok(stream)]);
        let channel = PushChannel::new(connector, Duration::from_secs(3));
        let mut messages = channel.subscribe();
        let connectivity = channel.connectivity();

        channel.connect();
        settle().await;
        assert_eq!(*connectivity.borrow(), Connectivity::Online);

        tx.send(Ok(PushMessage::ColumnsChanged)).unwrap();
        tx.send(Ok(PushMessage::TasksChanged)).unwrap();
        assert_eq!(messages.recv().await.unwrap(), PushMessage::ColumnsChanged);
        assert_eq!(messages.recv().await.unwrap(), PushMessage::TasksChanged);

        drop(tx);
        settle().await;
        assert_eq!(*connectivity.borrow(), Connectivity::Offline);
        channel.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_schedules_single_reconnect_every_delay() {
        let (tx, stream) = live_stream();
        let (connector, attempts) = ScriptedConnector::new(vec![Ok(stream)]);
        let channel = PushChannel::new(connector, Duration::from_secs(3));
        let mut connectivity = channel.connectivity();

        channel.connect();
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        connectivity.borrow_and_update();

        drop(tx);
        settle().await;
        assert!(connectivity.has_changed().unwrap());
        assert_eq!(*connectivity.borrow_and_update(), Connectivity::Offline);

        // Repeated connect requests while offline must not add timers.
        channel.connect();
        channel.connect();
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(2_999)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // That attempt failed: exactly one more, 3 seconds later.
        tokio::time::advance(Duration::from_millis(2_999)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(*connectivity.borrow(), Connectivity::Offline);

        channel.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_goes_offline_and_recovers() {
        let (tx, first) = live_stream();
        let (_tx2, second) = live_stream();
        let (connector, attempts) = ScriptedConnector::new(vec![Ok(first), Ok(second)]);
        let channel = PushChannel::new(connector, Duration::from_secs(3));
        let connectivity = channel.connectivity();

        channel.connect();
        settle().await;
        tx.send(Err(ChannelError::Transport("reset by peer".to_string()))).unwrap();
        settle().await;
        assert_eq!(*connectivity.borrow(), Connectivity::Offline);

        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(*connectivity.borrow(), Connectivity::Online);
        channel.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_reconnecting() {
        let (connector, attempts) = ScriptedConnector::new(vec![]);
        let channel = PushChannel::new(connector, Duration::from_secs(3));
        channel.connect();
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        channel.close();
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ws_connector_against_live_server() {
        use axum::extract::ws::{Message as AxumMessage, WebSocketUpgrade};
        use axum::response::IntoResponse;
        use axum::routing::get;

        async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
            ws.on_upgrade(|mut socket| async move {
                let frames = [r#"{"type":"columns_changed"}"#, "not json", r#"{"type":"tasks_changed"}"#];
                for frame in frames {
                    let _ = socket.send(AxumMessage::Text(frame.into())).await;
                }
                let _ = socket.send(AxumMessage::Close(None)).await;
            })
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route("/ws", get(ws_handler));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let connector = WsConnector::new(format!("ws://{}/ws", addr));
        let mut stream = connector.open().await.unwrap();
        assert_eq!(stream.next().await, Some(Ok(PushMessage::ColumnsChanged)));
        assert_eq!(stream.next().await, Some(Ok(PushMessage::TasksChanged)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        let connector = WsConnector::new("ws://127.0.0.1:1/ws");
        assert!(matches!(connector.open().await, Err(ChannelError::Connect(_))));
    }
}
