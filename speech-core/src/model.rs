//! Wire-adjacent data model shared by transport, pipeline, and session layers.

use serde::{Deserialize, Serialize};

/// 200 ms of mono 16 kHz 16-bit PCM: the atomic unit that may be lost.
///
/// `payload` is always exactly 3200 samples (6400 bytes); no partial chunk
/// is ever observable past the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub sample_rate: u32,
    pub channels: u8,
    pub payload: Vec<i16>,
    pub sequence_id: u64,
    pub timestamp_ms: u64,
}

pub const CHUNK_SAMPLE_RATE: u32 = 16_000;
pub const CHUNK_DURATION_MS: u32 = 200;
pub const CHUNK_SAMPLES: usize = 3_200;

impl AudioChunk {
    pub fn new(payload: Vec<i16>, sequence_id: u64, timestamp_ms: u64) -> Self {
        Self {
            sample_rate: CHUNK_SAMPLE_RATE,
            channels: 1,
            payload,
            sequence_id,
            timestamp_ms,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.sample_rate == CHUNK_SAMPLE_RATE
            && self.channels == 1
            && self.payload.len() == CHUNK_SAMPLES
    }
}

/// Client-supplied tuning knobs for one session's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub vad_energy_threshold: f32,
    pub silence_threshold_ms: u32,
    pub min_chunk_duration_ms: u32,
    pub max_chunk_duration_ms: u32,
    pub speech_density_threshold: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            vad_energy_threshold: 300.0,
            silence_threshold_ms: 1_000,
            min_chunk_duration_ms: 500,
            max_chunk_duration_ms: 30_000,
            speech_density_threshold: 0.6,
        }
    }
}

impl SessionSettings {
    /// `min <= max`; `threshold > 0`; `density` in `(0, 1]`.
    pub fn is_valid(&self) -> bool {
        self.min_chunk_duration_ms <= self.max_chunk_duration_ms
            && self.vad_energy_threshold > 0.0
            && self.speech_density_threshold > 0.0
            && self.speech_density_threshold <= 1.0
    }
}

/// Per-10ms-frame VAD accumulator state, reset at utterance boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VadFrameState {
    pub silence_duration_ms: u32,
    pub speech_duration_ms: u32,
    pub consecutive_silence: u32,
    pub consecutive_speech: u32,
    pub last_was_speech: bool,
}

impl VadFrameState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// An ordered run of int16 samples with VAD metadata, ready for the recognizer.
#[derive(Debug, Clone)]
pub struct UtteranceChunk {
    pub samples: Vec<i16>,
    pub total_duration_ms: u32,
    pub speech_duration_ms: u32,
}

/// A finished (or failed) transcription, destined for the session's result channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub timestamp_ms: u64,
    pub error: Option<String>,
}

impl TranscriptResult {
    pub fn ok(text: String, timestamp_ms: u64) -> Self {
        Self { text, timestamp_ms, error: None }
    }

    pub fn failed(timestamp_ms: u64, error: impl Into<String>) -> Self {
        Self { text: String::new(), timestamp_ms, error: Some(error.into()) }
    }
}
