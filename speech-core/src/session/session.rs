//! The per-connection pipeline: one noise suppressor, one chunker+VAD, one
//! decoding context, one settings snapshot (spec §3 "Session").
//!
//! `Session` is owned exclusively by that connection's handler task — it is
//! never placed behind a shared lock, matching spec §4.6's "per-session
//! state is accessed only by that session's handlers".

use uuid::Uuid;

use crate::audio::{NoiseSuppressor, SmartChunker};
use crate::error::Result;
use crate::model::{SessionSettings, UtteranceChunk};
use crate::recognizer::context::i16_to_f32;
use crate::recognizer::RecognizerContext;

// NoiseSuppressor::process/flush never fail: the neural implementation's
// denoise_frame is infallible, and the pass-through fallback is identity.

/// Bundles the pipeline components created on `control.start` and torn down
/// on `control.stop` / disconnect.
pub struct Session {
    pub id: Uuid,
    pub settings: SessionSettings,
    noise_suppressor: NoiseSuppressor,
    chunker: SmartChunker,
}

impl Session {
    pub fn new(id: Uuid, settings: SessionSettings) -> Self {
        Self {
            id,
            settings,
            noise_suppressor: NoiseSuppressor::new(),
            chunker: SmartChunker::new(settings),
        }
    }

    /// Feeds one inbound audio chunk's samples through the noise suppressor
    /// then the chunker. Returns an emitted utterance, if the chunker's
    /// emit-decision rule fired.
    pub fn ingest(&mut self, samples: &[i16]) -> Option<UtteranceChunk> {
        let denoised = self.noise_suppressor.process(samples);
        self.chunker.append(&denoised)
    }

    /// Flushes the noise suppressor's residual frame into the chunker, then
    /// flushes the chunker itself, applying `speech_sufficient` to whatever
    /// remains (spec §4.6 "control.stop").
    ///
    /// If feeding the residual into the chunker alone crosses an emit
    /// threshold, `append` already cleared the buffer and returned the
    /// utterance — `flush` would only see an empty buffer and lose it, so
    /// it's skipped in that case.
    pub fn stop(&mut self) -> Option<UtteranceChunk> {
        let residual = self.noise_suppressor.flush();
        if !residual.is_empty() {
            if let Some(utterance) = self.chunker.append(&residual) {
                return Some(utterance);
            }
        }
        self.chunker.flush()
    }
}

/// Runs one utterance through a recognizer context, converting int16 to the
/// float32 the recognizer needs (spec §4.5).
pub async fn transcribe_utterance(context: &RecognizerContext, utterance: &UtteranceChunk) -> Result<String> {
    let floats = i16_to_f32(&utterance.samples);
    context.transcribe(&floats).await
}
