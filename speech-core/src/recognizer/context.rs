//! C5 per-session half: a lightweight decoding context over the shared model.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperState};

use crate::error::{RecognitionFailure, Result, SpeechError};
use crate::recognizer::model::ContextConfig;

/// Per-session recognizer state derived from the shared model.
///
/// Decoding is serialized internally (spec §4.5: "MUST be serialized per
/// context") via the mutex around the raw `WhisperState`, so a context can
/// be safely referenced by a session even if callback tasks race to call
/// `transcribe` for two overlapping utterances.
pub struct RecognizerContext {
    _model: Arc<WhisperContext>,
    state: Mutex<WhisperState>,
    config: ContextConfig,
}

impl RecognizerContext {
    pub(crate) fn new(model: Arc<WhisperContext>, config: ContextConfig) -> Result<Self> {
        // `_model` keeps the shared context's refcount alive for at least as
        // long as this context; `WhisperState` holds its own internal
        // reference to the context data so it stays valid independently.
        let state = model
            .create_state()
            .map_err(|e| SpeechError::RecognitionError(RecognitionFailure(anyhow::anyhow!(e))))?;
        Ok(Self { _model: model, state: Mutex::new(state), config })
    }

    /// Decodes mono float32 samples at 16kHz in `[-1, 1]`, joining all
    /// emitted segments with single spaces.
    pub async fn transcribe(&self, samples: &[f32]) -> Result<String> {
        if samples.is_empty() {
            return Err(SpeechError::EmptyInput);
        }

        let mut params = FullParams::new(SamplingStrategy::BeamSearch { beam_size: 5, patience: 1.0 });
        if let Some(lang) = self.config.language.as_deref() {
            params.set_language(Some(lang));
        } else {
            params.set_language(Some("auto"));
        }
        params.set_translate(false);
        params.set_n_threads(self.config.thread_count);
        params.set_no_timestamps(true);
        params.set_token_timestamps(true);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);
        params.set_suppress_blank(true);
        params.set_suppress_non_speech_tokens(true);
        params.set_single_segment(false);
        params.set_no_context(true);
        if !self.config.initial_prompt.is_empty() {
            params.set_initial_prompt(&self.config.initial_prompt);
        }

        let mut state = self.state.lock().await;
        state
            .full(params, samples)
            .map_err(|e| SpeechError::RecognitionError(RecognitionFailure(anyhow::anyhow!(e))))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| SpeechError::RecognitionError(RecognitionFailure(anyhow::anyhow!(e))))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text_lossy(i)
                .map_err(|e| SpeechError::RecognitionError(RecognitionFailure(anyhow::anyhow!(e))))?;
            let trimmed = segment.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
        debug!(chars = text.len(), segments = num_segments, "transcription complete");
        Ok(text)
    }
}

/// int16 -> float32 conversion, scaling by `1/32768` (spec R1, §4.5).
/// Identity on round-trip except `-32768`, which clamps at the float side
/// already (no separate clamp needed going this direction).
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_to_f32_scales_into_unit_range() {
        let samples = [i16::MIN, 0, i16::MAX];
        let floats = i16_to_f32(&samples);
        assert!((floats[0] - (-1.0)).abs() < 1e-6);
        assert_eq!(floats[1], 0.0);
        assert!(floats[2] < 1.0 && floats[2] > 0.999);
    }
}
