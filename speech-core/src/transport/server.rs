//! Server-side half of the transport: one already-accepted WebSocket per peer.
//!
//! The server does not run the reconnection loop itself — a client that
//! reconnects opens a fresh TCP connection, which the Session Manager treats
//! as a new peer relationship (see DESIGN.md). This wrapper only provides
//! the ordered, reliable send/receive surface C6 needs.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::warn;

use crate::error::{Result, SpeechError};
use crate::transport::envelope::Message;

/// One accepted, already-upgraded WebSocket connection.
pub struct ServerConnection {
    outbound_tx: mpsc::UnboundedSender<WsMessage>,
}

impl ServerConnection {
    /// Splits `stream` into a write task (drained from `outbound_tx`) and a
    /// read loop that forwards parsed messages onto the returned receiver.
    /// The receiver yields `None` once the peer disconnects.
    pub fn spawn(stream: WebSocketStream<TcpStream>) -> (Self, mpsc::UnboundedReceiver<(Message, u64)>) {
        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match Message::from_json(&text) {
                        Ok((message, ts)) => {
                            if inbound_tx.send((message, ts)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping malformed inbound message"),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "server transport read error");
                        break;
                    }
                }
            }
            // inbound_tx drops here, signalling disconnect to the session manager.
        });

        (Self { outbound_tx }, inbound_rx)
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        self.send_at(message, now_ms())
    }

    /// Sends `message` with an explicit timestamp, rather than the current
    /// time — used to echo the client's original timestamp on `control.pong`.
    pub fn send_at(&self, message: &Message, timestamp_ms: u64) -> Result<()> {
        let json = message.to_json(timestamp_ms)?;
        self.outbound_tx
            .send(WsMessage::Text(json))
            .map_err(|_| SpeechError::NotConnected)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
