//! Reference capture daemon: reads audio from a pluggable source and streams
//! it to a speech-server over the reliable transport, printing transcripts
//! as they arrive.

mod audio_source;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use speech_core::config::DaemonConfig;
use speech_core::model::{AudioChunk, CHUNK_SAMPLES};
use speech_core::transport::{ClientTransport, Message};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audio_source::{AudioSource, SyntheticSource, WavFileSource};

#[derive(Parser, Debug)]
#[command(name = "speech-daemon", about = "Reference streaming audio capture client")]
struct Args {
    /// Overrides SPEECH_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,

    /// 16kHz mono WAV file to stream; omit to stream a synthetic tone.
    #[arg(long)]
    wav_path: Option<PathBuf>,

    /// Length of the synthetic tone, when `--wav-path` is omitted.
    #[arg(long, default_value_t = 10)]
    synthetic_secs: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = DaemonConfig::from_env();
    if let Some(server_url) = args.server_url {
        config.server_url = server_url;
    }

    let mut source: Box<dyn AudioSource> = match args.wav_path {
        Some(path) => Box::new(WavFileSource::open(&path)?),
        None => Box::new(SyntheticSource::new(args.synthetic_secs)),
    };

    let (transport, mut inbound_rx) = ClientTransport::new(&config.server_url);
    transport.connect().await?;
    info!(url = %config.server_url, "daemon connected");
    transport.send_control(Message::ControlStart(None)).await?;

    let result_task = tokio::spawn(async move {
        while let Some((message, _ts)) = inbound_rx.recv().await {
            match message {
                Message::TranscriptFinal(result) => match result.error {
                    Some(e) => warn!(error = %e, "recognition error"),
                    None => println!("{}", result.text),
                },
                Message::Error(msg) => warn!(%msg, "server reported error"),
                _ => {}
            }
        }
    });

    let mut sequence_id = 0u64;
    while let Some(samples) = source.next_chunk().await {
        debug_assert_eq!(samples.len(), CHUNK_SAMPLES);
        let chunk = AudioChunk::new(samples, sequence_id, now_ms());
        if let Err(e) = transport.send_audio(chunk).await {
            warn!(error = %e, "failed to send audio chunk");
        }
        sequence_id += 1;
    }

    transport.send_control(Message::ControlStop).await.ok();
    transport.close().await;
    let _ = result_task.await;
    Ok(())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
