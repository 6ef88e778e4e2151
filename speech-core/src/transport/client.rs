//! Client-side (capture daemon) half of the transport: the side that owns
//! the reconnection loop and the replay buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Result, SpeechError};
use crate::model::AudioChunk;
use crate::transport::backoff::{backoff_for_attempt, cancellable_sleep, MAX_ATTEMPTS};
use crate::transport::envelope::{AudioChunkPayload, Message};
use crate::transport::replay_buffer::ReplayBuffer;
use crate::transport::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, WsMessage>;

const OPEN_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_PACE: Duration = Duration::from_millis(10);

/// Reliable ordered channel from a capture daemon to a transcription server.
///
/// Owns connection lifecycle, the exponential-backoff reconnection loop, and
/// the bounded replay buffer. One instance per peer relationship.
pub struct ClientTransport {
    url: String,
    state_tx: watch::Sender<ConnectionState>,
    sink: AsyncMutex<Option<WsSink>>,
    replay_buffer: AsyncMutex<ReplayBuffer>,
    /// Mutual exclusion: only one reconnection attempt may run at a time.
    reconnect_lock: AsyncMutex<()>,
    close_signal: watch::Sender<bool>,
    inbound_tx: mpsc::UnboundedSender<(Message, u64)>,
    backoff: fn(u32) -> Duration,
}

impl ClientTransport {
    /// Creates a transport bound to `url`, returning it alongside the
    /// receiver for inbound messages (the `on_message` handler, expressed
    /// as a channel rather than a registered callback).
    pub fn new(url: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<(Message, u64)>) {
        Self::new_with_backoff(url, backoff_for_attempt)
    }

    /// Like [`Self::new`], but with the backoff schedule (I7) replaced by
    /// `backoff`. Exists so the reconnect state machine can be exercised
    /// against a real socket in an integration test without the default
    /// `1, 2, 4, ..., 30` schedule costing minutes of wall-clock time.
    pub fn new_with_backoff(
        url: impl Into<String>,
        backoff: fn(u32) -> Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(Message, u64)>) {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (close_signal, _) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            url: url.into(),
            state_tx,
            sink: AsyncMutex::new(None),
            replay_buffer: AsyncMutex::new(ReplayBuffer::new()),
            reconnect_lock: AsyncMutex::new(()),
            close_signal,
            inbound_tx,
            backoff,
        });
        (transport, inbound_rx)
    }

    /// Subscribe to `(connected, reconnecting)` state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    /// Performs the handshake and opens the channel. On success, spawns the
    /// read loop that forwards inbound messages and triggers reconnection on
    /// unexpected closure.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let (ws, _response) = connect_async(&self.url)
            .await
            .map_err(|e| SpeechError::ConnectError(e.to_string()))?;
        let (sink, stream) = ws.split();
        *self.sink.lock().await = Some(sink);
        self.set_state(ConnectionState::Connected);
        info!(url = %self.url, "transport connected");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.read_loop(stream).await;
        });
        Ok(())
    }

    async fn read_loop(self: Arc<Self>, mut stream: futures_util::stream::SplitStream<WsStream>) {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => match Message::from_json(&text) {
                    Ok((message, ts)) => {
                        if self.inbound_tx.send((message, ts)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping malformed inbound message"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("transport stream closed by peer");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "transport read error");
                    break;
                }
            }
        }
        if self.state() == ConnectionState::Connected {
            self.begin_reconnect().await;
        }
    }

    /// Sends an audio chunk. If connected, transmits now. If reconnecting,
    /// buffers it for replay. If disconnected with no reconnection under
    /// way, fails with `NotConnected`.
    pub async fn send_audio(self: &Arc<Self>, chunk: AudioChunk) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => {
                self.transmit_chunk(&chunk).await?;
                Ok(())
            }
            ConnectionState::Reconnecting => {
                self.replay_buffer.lock().await.push(chunk);
                Ok(())
            }
            _ => Err(SpeechError::NotConnected),
        }
    }

    /// Sends a control message; never buffered on disconnect.
    pub async fn send_control(&self, message: Message) -> Result<()> {
        if !self.state().is_connected() {
            return Err(SpeechError::NotConnected);
        }
        self.send_raw(&message).await
    }

    async fn transmit_chunk(&self, chunk: &AudioChunk) -> Result<()> {
        let payload = AudioChunkPayload::from_samples(&chunk.payload, chunk.sequence_id);
        self.send_raw(&Message::AudioChunk(payload)).await
    }

    async fn send_raw(&self, message: &Message) -> Result<()> {
        let json = message.to_json(now_ms())?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(SpeechError::NotConnected)?;
        sink.send(WsMessage::Text(json)).await.map_err(|e| {
            warn!(error = %e, "websocket send failed");
            SpeechError::NotConnected
        })?;
        Ok(())
    }

    /// Idempotent teardown: cancels any in-progress reconnection and closes
    /// the channel.
    pub async fn close(&self) {
        let _ = self.close_signal.send(true);
        self.set_state(ConnectionState::Closed);
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        self.replay_buffer.lock().await.drain_for_flush();
    }

    async fn begin_reconnect(self: &Arc<Self>) {
        // try_lock doubles as the mutual-exclusion flag: if a reconnect loop
        // is already running, a second caller simply returns.
        let Ok(_guard) = self.reconnect_lock.try_lock() else {
            return;
        };
        self.set_state(ConnectionState::Reconnecting);
        info!("transport reconnecting");

        let mut cancel = self.close_signal.subscribe();
        for attempt in 0..MAX_ATTEMPTS {
            if self.state() == ConnectionState::Closed {
                return;
            }
            let wait = (self.backoff)(attempt);
            debug!(attempt, ?wait, "backing off before reconnect attempt");
            if !cancellable_sleep(wait, &mut cancel).await {
                return;
            }

            *self.sink.lock().await = None;
            // The handshake (and with it, the "open" event) completes inside
            // connect_async itself; bound the whole thing at OPEN_TIMEOUT.
            match timeout(OPEN_TIMEOUT, connect_async(&self.url)).await {
                Ok(Ok((ws, _))) => {
                    let (sink, stream) = ws.split();
                    *self.sink.lock().await = Some(sink);
                    self.set_state(ConnectionState::Connected);
                    info!(attempt, "reconnected");
                    self.flush_replay_buffer().await;

                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        this.read_loop(stream).await;
                    });
                    return;
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    continue;
                }
                Err(_) => {
                    warn!(attempt, "reconnect attempt timed out waiting for open");
                    continue;
                }
            }
        }

        self.set_state(ConnectionState::GaveUp);
        warn!(attempts = MAX_ATTEMPTS, "reconnection gave up");
    }

    /// Flushes buffered chunks in insertion order, pacing sends by 10ms.
    /// Invariant: by the time this runs the state is already `Connected`,
    /// so concurrent `send_audio` calls take the fast path and never race
    /// an append into the buffer being drained here.
    async fn flush_replay_buffer(&self) {
        let drained = self.replay_buffer.lock().await.drain_for_flush();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "flushing replay buffer");
        for chunk in drained {
            if let Err(e) = self.transmit_chunk(&chunk).await {
                warn!(error = %e, sequence_id = chunk.sequence_id, "failed to flush buffered chunk");
            }
            tokio::time::sleep(FLUSH_PACE).await;
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
