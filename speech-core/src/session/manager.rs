//! C6: lifecycle of per-connection pipelines, dispatch of inbound audio,
//! fan-out of results (spec §4.6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::SpeechError;
use crate::model::{TranscriptResult, UtteranceChunk};
use crate::recognizer::{ContextConfig, RecognizerContext, SharedModel};
use crate::session::session::{transcribe_utterance, Session};
use crate::transport::envelope::Message;
use crate::transport::server::ServerConnection;

/// Owns the shared model and tracks how many connections are live.
///
/// Per-session state is never shared: each accepted connection spawns a task
/// that owns its own `Session` exclusively (spec §4.6). The only state this
/// manager itself guards is the live-connection count used for I5, which is
/// simple enough that a plain atomic stands in for the spec's "read/write
/// lock over the session table" (see DESIGN.md).
pub struct SessionManager {
    shared_model: Arc<SharedModel>,
    context_config_template: ContextConfig,
    session_count: Arc<AtomicUsize>,
}

impl SessionManager {
    pub fn new(shared_model: Arc<SharedModel>, context_config_template: ContextConfig) -> Self {
        Self {
            shared_model,
            context_config_template,
            session_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Current count of live, handshake-completed connections (I5).
    pub fn session_count(&self) -> usize {
        self.session_count.load(Ordering::SeqCst)
    }

    /// Accepts WebSocket connections on `bind_addr` until the listener fails,
    /// spawning a handler task per accepted peer.
    pub async fn serve(self: Arc<Self>, bind_addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!(%bind_addr, "session manager listening");
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = this.accept_connection(stream).await {
                    warn!(%peer_addr, error = %e, "connection handler exited with error");
                }
            });
        }
    }

    async fn accept_connection(self: Arc<Self>, stream: TcpStream) -> anyhow::Result<()> {
        let ws_stream = accept_async(stream).await?;
        let session_id = Uuid::new_v4();
        self.session_count.fetch_add(1, Ordering::SeqCst);
        info!(%session_id, live_sessions = self.session_count(), "connection established");

        let (conn, inbound_rx) = ServerConnection::spawn(ws_stream);
        let result = self.run_session(session_id, conn, inbound_rx).await;

        self.session_count.fetch_sub(1, Ordering::SeqCst);
        info!(%session_id, live_sessions = self.session_count(), "connection closed");
        result
    }

    /// The session's full lifecycle: `control.start` allocates the pipeline,
    /// `audio.chunk` feeds it, `control.stop` or disconnect tears it down
    /// (spec §4.6).
    async fn run_session(
        &self,
        session_id: Uuid,
        conn: ServerConnection,
        mut inbound_rx: mpsc::UnboundedReceiver<(Message, u64)>,
    ) -> anyhow::Result<()> {
        let conn = Arc::new(conn);
        let mut session: Option<Session> = None;
        let mut context: Option<Arc<RecognizerContext>> = None;
        let mut result_tx: Option<mpsc::UnboundedSender<TranscriptResult>> = None;

        while let Some((message, ts)) = inbound_rx.recv().await {
            match message {
                Message::ControlStart(settings) => {
                    let settings = settings.unwrap_or_default();
                    if !settings.is_valid() {
                        warn!(%session_id, "rejecting invalid session settings");
                        let _ = conn.send(&Message::Error("invalid session settings".into()));
                        continue;
                    }
                    session = Some(Session::new(session_id, settings));
                    let ctx = self
                        .shared_model
                        .new_context(self.context_config_template.clone())?;
                    context = Some(Arc::new(ctx));

                    let (tx, rx) = mpsc::unbounded_channel();
                    result_tx = Some(tx);
                    spawn_result_forwarder(Arc::clone(&conn), rx);
                    info!(%session_id, "session started");
                }
                Message::AudioChunk(payload) => {
                    let (Some(sess), Some(ctx)) = (session.as_mut(), context.as_ref()) else {
                        continue; // no active session: drop silently
                    };
                    let samples = match payload.decode_samples() {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(%session_id, error = %e, "dropping malformed audio chunk");
                            continue;
                        }
                    };
                    if let Some(utterance) = sess.ingest(&samples) {
                        dispatch_utterance(Arc::clone(ctx), utterance, result_tx.clone());
                    }
                }
                Message::ControlStop => {
                    if let (Some(sess), Some(ctx)) = (session.as_mut(), context.as_ref()) {
                        if let Some(utterance) = sess.stop() {
                            dispatch_utterance(Arc::clone(ctx), utterance, result_tx.clone());
                        }
                    }
                    session = None;
                    context = None;
                    result_tx = None; // forwarder drains in-flight sends, then exits
                    info!(%session_id, "session stopped");
                }
                Message::ControlPing => {
                    let _ = conn.send_at(&Message::ControlPong, ts);
                }
                other => {
                    warn!(%session_id, message = ?other, "ignoring message outside session lifecycle");
                }
            }
        }

        if let (Some(sess), Some(ctx)) = (session.as_mut(), context.as_ref()) {
            if let Some(utterance) = sess.stop() {
                dispatch_utterance(Arc::clone(ctx), utterance, result_tx.clone());
            }
        }
        Ok(())
    }
}

/// Runs recognition on a new task so the connection's inbound loop is never
/// blocked on decoding.
fn dispatch_utterance(
    context: Arc<RecognizerContext>,
    utterance: UtteranceChunk,
    result_tx: Option<mpsc::UnboundedSender<TranscriptResult>>,
) {
    let Some(result_tx) = result_tx else { return };
    tokio::spawn(async move {
        let now = now_ms();
        let result = match transcribe_utterance(&context, &utterance).await {
            Ok(text) => TranscriptResult::ok(text, now),
            Err(SpeechError::EmptyInput) => return,
            Err(e) => {
                error!(error = %e, "recognition failed");
                TranscriptResult::failed(now, e.to_string())
            }
        };
        let _ = result_tx.send(result);
    });
}

/// Drains the result channel and forwards `transcript.final` messages; exits
/// once the channel closes (session stopped, or connection dropped).
fn spawn_result_forwarder(
    conn: Arc<ServerConnection>,
    mut result_rx: mpsc::UnboundedReceiver<TranscriptResult>,
) {
    tokio::spawn(async move {
        while let Some(result) = result_rx.recv().await {
            if let Err(e) = conn.send(&Message::TranscriptFinal(result)) {
                warn!(error = %e, "failed to forward transcript result");
                break;
            }
        }
    });
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
