// Connection lifecycle controller - owns the single sentiment stream
//
// The controller manages:
// - The Disconnected / Connecting / Connected / Failed state machine
// - One connection task per epoch, cancelled via CancellationToken
// - Session gating before any transport attempt
// - Status and transition broadcasts for observers
//
// Every attempt gets a fresh epoch and token. A task only touches shared state
// while holding the inner lock and only if its epoch is still current and its
// token is not cancelled, so a late task from an older connection can never
// overwrite the state of a newer one or apply records after disconnect.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::configs::StreamConfig;
use crate::core::dispatcher::SnapshotPublisher;
use crate::ingestors::{ByteStream, DecoderStats, FrameDecoder, StreamTransport};
use crate::model::DeltaRecord;
use crate::platform::SessionGate;
use crate::types::{ConnectionState, ConnectionStatus, StreamError};

const TRANSITION_CAPACITY: usize = 64;

struct Inner {
    status: ConnectionStatus,
    cancel: Option<CancellationToken>,
    decoder_stats: DecoderStats,
}

struct Shared {
    transport: Arc<dyn StreamTransport>,
    publisher: Arc<SnapshotPublisher>,
    session: Arc<dyn SessionGate>,
    reconnect_delay: Duration,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<ConnectionStatus>,
    transitions: broadcast::Sender<ConnectionState>,
}

/// Cheap-to-clone handle to the stream connection.
#[derive(Clone)]
pub struct ConnectionController {
    shared: Arc<Shared>,
}

impl ConnectionController {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        publisher: Arc<SnapshotPublisher>,
        session: Arc<dyn SessionGate>,
        reconnect_delay: Duration,
    ) -> Self {
        let status = ConnectionStatus::default();
        let (status_tx, _) = watch::channel(status.clone());
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                transport,
                publisher,
                session,
                reconnect_delay,
                inner: Mutex::new(Inner {
                    status,
                    cancel: None,
                    decoder_stats: DecoderStats::default(),
                }),
                status_tx,
                transitions,
            }),
        }
    }

    pub fn from_config(
        config: &StreamConfig,
        transport: Arc<dyn StreamTransport>,
        publisher: Arc<SnapshotPublisher>,
        session: Arc<dyn SessionGate>,
    ) -> Self {
        Self::new(transport, publisher, session, config.reconnect_delay())
    }

    /// Starts a connection unless one is already connecting or connected.
    ///
    /// Returns immediately; the attempt runs on a spawned task, so this must be
    /// called from within a Tokio runtime. Without valid credentials nothing is
    /// attempted and the refusal is recorded as the last error.
    pub fn connect(&self) {
        let mut inner = self.shared.lock_inner();

        if inner.status.state.is_active() {
            log::debug!("connect() ignored, stream is {:?}", inner.status.state);
            return;
        }

        if !self.shared.session.has_valid_credentials() {
            log::warn!("Not connecting to sentiment stream: no valid session");
            inner.status.last_error = Some(StreamError::NoSession.to_string());
            self.shared.status_tx.send_replace(inner.status.clone());
            return;
        }

        if let Some(stale) = inner.cancel.take() {
            stale.cancel();
        }

        let token = CancellationToken::new();
        inner.cancel = Some(token.clone());
        inner.status.epoch += 1;
        inner.status.attempts += 1;
        inner.decoder_stats = DecoderStats::default();
        let epoch = inner.status.epoch;
        self.shared.set_state(&mut inner, ConnectionState::Connecting);
        drop(inner);

        log::info!(
            "Connecting to sentiment stream at {} (epoch {})",
            self.shared.transport.describe(),
            epoch
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.run_connection(epoch, token).await;
        });
    }

    /// Cancels any in-flight attempt or open stream and clears the focused
    /// category. Safe to call in any state.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock_inner();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        self.shared.publisher.clear_focus();
        if inner.status.state != ConnectionState::Disconnected {
            log::info!("Disconnecting sentiment stream (epoch {})", inner.status.epoch);
            self.shared.set_state(&mut inner, ConnectionState::Disconnected);
        }
    }

    /// Disconnects, waits the reconnect delay, then connects again.
    pub async fn reconnect(&self) {
        self.disconnect();
        tokio::time::sleep(self.shared.reconnect_delay).await;
        self.connect();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.lock_inner().status.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock_inner().status.state.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock_inner().status.last_error.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock_inner().status.is_connected()
    }

    /// Decoder counters of the current or most recent connection.
    pub fn decoder_stats(&self) -> DecoderStats {
        self.shared.lock_inner().decoder_stats
    }

    /// Status after every change, latest value only.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Every state transition in order, including transient `Failed` states.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.transitions.subscribe()
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.shared.publisher
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.shared.reconnect_delay
    }
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        log::debug!("Stream state {:?} -> {:?}", inner.status.state, state);
        inner.status.state = state.clone();
        self.status_tx.send_replace(inner.status.clone());
        let _ = self.transitions.send(state);
    }

    /// Locks the inner state if `epoch` still owns the connection.
    fn lock_if_current(&self, epoch: u64, token: &CancellationToken) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.lock_inner();
        (inner.status.epoch == epoch && !token.is_cancelled()).then_some(inner)
    }

    async fn run_connection(&self, epoch: u64, token: CancellationToken) {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::debug!("Connection attempt {} cancelled before open", epoch);
                return;
            }
            result = self.transport.open() => result,
        };

        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail(epoch, &token, e);
                return;
            }
        };

        {
            let Some(mut inner) = self.lock_if_current(epoch, &token) else {
                return;
            };
            inner.status.last_error = None;
            self.set_state(&mut inner, ConnectionState::Connected);
        }
        log::info!("Sentiment stream connected (epoch {})", epoch);

        self.read_stream(epoch, &token, bytes).await;
    }

    async fn read_stream(&self, epoch: u64, token: &CancellationToken, mut bytes: ByteStream) {
        let mut decoder = FrameDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::debug!("Stream read {} cancelled", epoch);
                    return;
                }
                chunk = bytes.next() => chunk,
            };

            match next {
                Some(Ok(chunk)) => {
                    let records = decoder.feed(&chunk);
                    if !self.apply_records(epoch, token, &records, decoder.stats()) {
                        return;
                    }
                }
                Some(Err(e)) => {
                    self.fail(epoch, token, e);
                    return;
                }
                None => {
                    let records = decoder.finish();
                    if !self.apply_records(epoch, token, &records, decoder.stats()) {
                        return;
                    }
                    if let Some(mut inner) = self.lock_if_current(epoch, token) {
                        log::info!("Sentiment stream closed by server (epoch {})", epoch);
                        inner.cancel = None;
                        self.set_state(&mut inner, ConnectionState::Disconnected);
                    }
                    return;
                }
            }
        }
    }

    /// Applies records in order while the epoch is current. Returns false once
    /// the connection has been superseded.
    fn apply_records(
        &self,
        epoch: u64,
        token: &CancellationToken,
        records: &[DeltaRecord],
        stats: DecoderStats,
    ) -> bool {
        let Some(mut inner) = self.lock_if_current(epoch, token) else {
            return false;
        };
        inner.decoder_stats = stats;
        for record in records {
            self.publisher.apply(record);
        }
        true
    }

    fn fail(&self, epoch: u64, token: &CancellationToken, error: StreamError) {
        let Some(mut inner) = self.lock_if_current(epoch, token) else {
            log::debug!("Ignoring failure of superseded connection {}: {}", epoch, error);
            return;
        };
        let reason = error.to_string();
        log::error!("Sentiment stream failed (epoch {}): {}", epoch, reason);
        inner.cancel = None;
        inner.status.last_error = Some(reason.clone());
        self.set_state(&mut inner, ConnectionState::Failed(reason));
        self.set_state(&mut inner, ConnectionState::Disconnected);
    }
}
