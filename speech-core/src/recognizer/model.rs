//! C5 shared half: the acoustic model, loaded once and shared read-only.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use whisper_rs::{WhisperContext, WhisperContextParameters};

use crate::error::{RecognitionFailure, Result, SpeechError};
use crate::recognizer::context::RecognizerContext;

/// GPU acceleration knobs, carried through from the binary's configuration
/// into `WhisperContextParameters`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccelerationConfig {
    pub use_gpu: bool,
    pub gpu_device: i32,
    pub flash_attn: bool,
}

/// The recognizer's weights: loaded once at process startup, read-only for
/// the rest of the process lifetime, referenced by every session's context.
///
/// No internal lock is needed past construction — `WhisperContext` is safe
/// to share across threads and `create_state` never mutates it.
pub struct SharedModel {
    context: Arc<WhisperContext>,
}

impl SharedModel {
    pub fn load(model_path: impl AsRef<Path>, acceleration: AccelerationConfig) -> Result<Self> {
        let path = model_path.as_ref();
        info!(path = %path.display(), "loading acoustic model");
        let params = WhisperContextParameters {
            use_gpu: acceleration.use_gpu,
            gpu_device: acceleration.gpu_device,
            flash_attn: acceleration.flash_attn,
            ..Default::default()
        };
        let context = WhisperContext::new_with_params(&path.to_string_lossy(), params)
            .map_err(|e| SpeechError::RecognitionError(RecognitionFailure(anyhow::anyhow!(e))))?;
        info!("acoustic model loaded");
        Ok(Self { context: Arc::new(context) })
    }

    /// Produces a lightweight per-session decoding context. Contexts must
    /// not be shared across sessions concurrently (enforced by `Session`
    /// owning its context exclusively).
    pub fn new_context(&self, config: ContextConfig) -> Result<RecognizerContext> {
        RecognizerContext::new(Arc::clone(&self.context), config)
    }
}

/// Per-session decoding configuration (spec §4.5).
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// `None` means "auto-detect".
    pub language: Option<String>,
    pub thread_count: i32,
    pub initial_prompt: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            language: None,
            thread_count: 4,
            initial_prompt: String::new(),
        }
    }
}
