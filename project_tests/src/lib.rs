//! # Shared Test Support
//!
//! Fixtures used by the integration tests under `tests/`: a scripted
//! transport, a widget sink that records every push, SSE frame builders and a
//! one-shot local HTTP server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use lib_sentiment::model::WidgetUpdate;
use lib_sentiment::platform::{NoopWidgetSink, WidgetSink};
use lib_sentiment::{
    AggregationEngine, ByteStream, Category, ConnectionController, ConnectionStatus, Lookbacks, SessionFlag,
    SnapshotPublisher, StreamError, StreamResult, StreamTransport,
};

// --- Frames ---

/// One SSE event carrying `deltas` for the given categories, zero elsewhere.
pub fn delta_frame(timestamp: &str, deltas: &[(Category, f64)]) -> String {
    sentiment_frame(timestamp, deltas, &Lookbacks::default())
}

/// Like [`delta_frame`], with the optional lookback fields filled in.
pub fn sentiment_frame(timestamp: &str, deltas: &[(Category, f64)], lookbacks: &Lookbacks) -> String {
    let mut sentiment = serde_json::Map::new();
    for category in Category::ALL {
        let value = deltas
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, v)| *v)
            .unwrap_or(0.0);
        sentiment.insert(category.as_str().to_string(), serde_json::json!(value));
    }
    let optional = [
        ("onehourbefore", lookbacks.one_hour_before),
        ("sixhoursbefore", lookbacks.six_hours_before),
        ("onedaybefore", lookbacks.one_day_before),
        ("oneweekbefore", lookbacks.one_week_before),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            sentiment.insert(key.to_string(), serde_json::json!(value));
        }
    }
    let payload = serde_json::json!({ "timestamp": timestamp, "sentiment": sentiment });
    format!("data: {}\n\n", payload)
}

pub fn calm_frame(delta: f64) -> String {
    delta_frame("2025-07-28T10:00:00Z", &[(Category::Calm, delta)])
}

pub const HEARTBEAT_FRAME: &str = "data: {\"type\": \"heartbeat\"}\n\n";

// --- Scripted transport ---

/// What the next `open` call does.
pub enum Script {
    /// Succeeds and streams whatever is pushed into the paired sender.
    Stream(UnboundedReceiver<StreamResult<Bytes>>),
    /// Fails with the given HTTP status.
    Status(u16),
    /// Never resolves.
    Hang,
}

/// Transport driven by a queue of scripts, one per connection attempt.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Queues a successful connection and returns its feed.
    pub fn push_stream(&self) -> UnboundedSender<StreamResult<Bytes>> {
        let (tx, rx) = unbounded();
        self.push(Script::Stream(rx));
        tx
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self) -> StreamResult<ByteStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Stream(rx)) => Ok(Box::pin(rx)),
            Some(Script::Status(code)) => Err(StreamError::HttpStatus(code)),
            Some(Script::Hang) | None => futures_util::future::pending().await,
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

// --- Widget sink ---

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetCall {
    Start(WidgetUpdate),
    Update(WidgetUpdate),
    StopAll,
}

/// Records every call in order.
#[derive(Default)]
pub struct RecordingWidgetSink {
    calls: Mutex<Vec<WidgetCall>>,
}

impl RecordingWidgetSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<WidgetCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<WidgetUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                WidgetCall::Update(update) => Some(update),
                _ => None,
            })
            .collect()
    }
}

impl WidgetSink for RecordingWidgetSink {
    fn start(&self, update: &WidgetUpdate) -> bool {
        self.calls.lock().unwrap().push(WidgetCall::Start(update.clone()));
        true
    }

    fn update(&self, update: &WidgetUpdate) {
        self.calls.lock().unwrap().push(WidgetCall::Update(update.clone()));
    }

    fn stop_all(&self) {
        self.calls.lock().unwrap().push(WidgetCall::StopAll);
    }
}

// --- Wiring ---

pub const TEST_RECONNECT_DELAY: Duration = Duration::from_millis(20);

pub fn publisher(widget: Arc<dyn WidgetSink>) -> Arc<SnapshotPublisher> {
    Arc::new(SnapshotPublisher::new(AggregationEngine::default(), widget, 20))
}

/// Controller over `transport` with a valid session and no widget platform.
pub fn controller(transport: Arc<dyn StreamTransport>) -> ConnectionController {
    controller_with(transport, publisher(Arc::new(NoopWidgetSink)), Arc::new(SessionFlag::new(true)))
}

pub fn controller_with(
    transport: Arc<dyn StreamTransport>,
    publisher: Arc<SnapshotPublisher>,
    session: Arc<SessionFlag>,
) -> ConnectionController {
    ConnectionController::new(transport, publisher, session, TEST_RECONNECT_DELAY)
}

pub async fn wait_for_status(
    controller: &ConnectionController,
    pred: impl FnMut(&ConnectionStatus) -> bool,
) {
    let mut rx = controller.subscribe_status();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for connection status")
        .expect("status channel closed");
}

pub async fn wait_for_value(controller: &ConnectionController, category: Category, value: f64) {
    let mut rx = controller.publisher().subscribe_latest();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.current_value(category) == value),
    )
    .await
    .expect("timed out waiting for snapshot")
    .expect("snapshot channel closed");
}

// --- Local HTTP server ---

/// Serves one request on `127.0.0.1:0` with the given status line and body,
/// then closes. Resolves to the base URL and a receiver for the request head.
pub async fn serve_once(status_line: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let _ = tx.send(String::from_utf8_lossy(&head).to_string());

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{}",
            status_line, body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    (format!("http://127.0.0.1:{}", port), rx)
}
