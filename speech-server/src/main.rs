//! Transcription server binary: loads the acoustic model once, then accepts
//! streaming audio connections and returns final transcripts per utterance.

use std::sync::Arc;

use clap::Parser;
use speech_core::config::ServerConfig;
use speech_core::recognizer::{ContextConfig, SharedModel};
use speech_core::session::SessionManager;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "speech-server", about = "Real-time speech transcription server")]
struct Args {
    /// Overrides SPEECH_BIND_ADDR.
    #[arg(long)]
    bind_addr: Option<String>,

    /// Overrides SPEECH_MODEL_PATH.
    #[arg(long)]
    model_path: Option<String>,

    /// BCP-47 language code; omit for auto-detection.
    #[arg(long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::from_env();
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(model_path) = args.model_path {
        config.model_path = model_path.into();
    }

    info!(?config, "starting speech server");
    let shared_model = Arc::new(SharedModel::load(&config.model_path, config.acceleration)?);
    let context_config = ContextConfig {
        language: args.language,
        thread_count: config.thread_count,
        ..Default::default()
    };

    let manager = Arc::new(SessionManager::new(shared_model, context_config));
    manager.serve(&config.bind_addr).await
}
