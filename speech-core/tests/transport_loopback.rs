//! Exercises `ClientTransport` against a real loopback WebSocket server,
//! the one thing the transport's unit tests can't cover on their own.

use std::time::Duration;

use futures_util::StreamExt;
use speech_core::model::{AudioChunk, CHUNK_SAMPLES};
use speech_core::transport::{ClientTransport, ConnectionState, Message, ServerConnection};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

async fn spawn_loopback_server() -> (String, tokio::task::JoinHandle<ServerConnection>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (conn, mut inbound) = ServerConnection::spawn(ws);
        // Drain exactly one control message so the caller can assert on it,
        // then hand the connection back for further assertions.
        let _first = inbound.recv().await;
        tokio::spawn(async move { while inbound.recv().await.is_some() {} });
        conn
    });
    (format!("ws://{addr}"), handle)
}

#[tokio::test]
async fn connect_and_send_control_round_trips() {
    let (url, handle) = spawn_loopback_server().await;
    let (transport, _inbound) = ClientTransport::new(url);
    transport.connect().await.expect("connect should succeed");
    transport
        .send_control(Message::ControlStart(None))
        .await
        .expect("control message should send once connected");

    let conn = handle.await.expect("server task should not panic");
    // The server received and forwarded our control.start; a response can be
    // sent back over the same connection.
    conn.send(&Message::ControlPong).expect("server should be able to reply");
}

#[tokio::test]
async fn send_audio_while_connected_does_not_buffer() {
    let (url, _handle) = spawn_loopback_server().await;
    let (transport, _inbound) = ClientTransport::new(url);
    transport.connect().await.expect("connect should succeed");

    let chunk = AudioChunk::new(vec![0i16; CHUNK_SAMPLES], 0, 0);
    transport.send_audio(chunk).await.expect("send while connected should succeed");
}

#[tokio::test]
async fn send_audio_before_connect_fails_not_connected() {
    let (transport, _inbound) = ClientTransport::new("ws://127.0.0.1:1".to_string());
    let chunk = AudioChunk::new(vec![0i16; CHUNK_SAMPLES], 0, 0);
    let err = transport.send_audio(chunk).await.unwrap_err();
    assert!(matches!(err, speech_core::SpeechError::NotConnected));
}

/// S2: the server hangs up mid-stream. Chunks sent while the client is
/// reconnecting must buffer, then replay in order once the client reconnects
/// to the (still-listening) loopback server.
#[tokio::test]
async fn reconnect_replays_buffered_audio_after_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // First generation: accept one peer, read until the pre-drop chunk
    // (sequence_id 0) arrives, then hang up — simulating a crashed/restarted
    // peer without tearing down the listener itself.
    let first_gen = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Ok((Message::AudioChunk(payload), _ts)) = Message::from_json(&text) {
                        if payload.sequence_id == 0 {
                            break;
                        }
                    }
                }
                Some(Ok(_)) => continue,
                _ => break,
            }
        }
        let _ = ws.close(None).await;
        listener
    });

    let (transport, _inbound) =
        ClientTransport::new_with_backoff(format!("ws://{addr}"), |_| Duration::from_millis(20));
    transport.connect().await.expect("initial connect should succeed");
    transport
        .send_control(Message::ControlStart(None))
        .await
        .expect("control.start should send");
    transport
        .send_audio(AudioChunk::new(vec![0i16; CHUNK_SAMPLES], 0, 0))
        .await
        .expect("pre-drop chunk should send while connected");

    let listener = first_gen.await.expect("first generation should not panic");

    let mut state_rx = transport.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), state_rx.wait_for(|s| *s == ConnectionState::Reconnecting))
        .await
        .expect("client should notice the disconnect and start reconnecting")
        .unwrap();

    transport
        .send_audio(AudioChunk::new(vec![0i16; CHUNK_SAMPLES], 1, 0))
        .await
        .expect("chunk sent while reconnecting should buffer, not error");
    transport
        .send_audio(AudioChunk::new(vec![0i16; CHUNK_SAMPLES], 2, 0))
        .await
        .expect("chunk sent while reconnecting should buffer, not error");

    let second_gen = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (_conn, mut inbound) = ServerConnection::spawn(ws);
        let mut sequence_ids = Vec::new();
        while let Some((message, _ts)) = inbound.recv().await {
            if let Message::AudioChunk(payload) = message {
                sequence_ids.push(payload.sequence_id);
                if sequence_ids.len() == 2 {
                    break;
                }
            }
        }
        sequence_ids
    });

    let replayed = tokio::time::timeout(Duration::from_secs(5), second_gen)
        .await
        .expect("replay should complete well within the timeout")
        .expect("second generation should not panic");
    assert_eq!(replayed, vec![1, 2], "buffered chunks must replay in order");
}

/// S5: the listener never comes back. After exhausting `MAX_ATTEMPTS`
/// reconnect attempts, the client must settle into `GaveUp`.
#[tokio::test]
async fn reconnect_gives_up_after_exhausting_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Completes the handshake so `connect()` below can return, then drops
    // `listener` on task exit: nothing will ever answer another connect
    // attempt on this port again.
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    });

    let (transport, _inbound) =
        ClientTransport::new_with_backoff(format!("ws://{addr}"), |_| Duration::from_millis(5));
    transport.connect().await.expect("initial connect should succeed");

    let ws = accept.await.expect("accept task should not panic");
    // Hang the peer up, forcing the client into its reconnect loop against a
    // now-dead port.
    drop(ws);

    let mut state_rx = transport.subscribe_state();
    tokio::time::timeout(Duration::from_secs(10), state_rx.wait_for(|s| *s == ConnectionState::GaveUp))
        .await
        .expect("client should give up within the timeout")
        .unwrap();
    assert_eq!(transport.state(), ConnectionState::GaveUp);
}
