//! Pluggable capture backends. Microphone integration is platform-specific
//! and out of scope here; both implementations below feed the same
//! 200ms/3200-sample chunk contract the transport expects.

use async_trait::async_trait;
use speech_core::model::CHUNK_SAMPLES;

/// Produces successive chunks of mono 16kHz int16 PCM. `None` signals the
/// stream is exhausted.
#[async_trait]
pub trait AudioSource: Send {
    async fn next_chunk(&mut self) -> Option<Vec<i16>>;
}

/// Reads a 16kHz mono WAV file and serves it back in fixed-size chunks,
/// zero-padding the final partial chunk.
pub struct WavFileSource {
    samples: std::vec::IntoIter<i16>,
    exhausted: bool,
}

impl WavFileSource {
    pub fn open(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        anyhow::ensure!(
            spec.sample_rate == 16_000 && spec.channels == 1,
            "expected 16kHz mono WAV, got {}Hz/{}ch",
            spec.sample_rate,
            spec.channels
        );
        let samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int => reader.samples::<i16>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v * i16::MAX as f32) as i16))
                .collect::<Result<_, _>>()?,
        };
        Ok(Self { samples: samples.into_iter(), exhausted: false })
    }
}

#[async_trait]
impl AudioSource for WavFileSource {
    async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        if self.exhausted {
            return None;
        }
        let mut chunk: Vec<i16> = (&mut self.samples).take(CHUNK_SAMPLES).collect();
        if chunk.is_empty() {
            return None;
        }
        if chunk.len() < CHUNK_SAMPLES {
            self.exhausted = true;
            chunk.resize(CHUNK_SAMPLES, 0);
        }
        Some(chunk)
    }
}

/// Synthetic 440Hz tone, useful for exercising the transport and pipeline
/// without a capture device or sample file.
pub struct SyntheticSource {
    phase: f32,
    chunks_remaining: usize,
}

impl SyntheticSource {
    pub fn new(duration_secs: u32) -> Self {
        let chunks = (duration_secs * 1000) / speech_core::model::CHUNK_DURATION_MS;
        Self { phase: 0.0, chunks_remaining: chunks as usize }
    }
}

#[async_trait]
impl AudioSource for SyntheticSource {
    async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        if self.chunks_remaining == 0 {
            return None;
        }
        self.chunks_remaining -= 1;
        let step = 440.0 * std::f32::consts::TAU / 16_000.0;
        let mut out = Vec::with_capacity(CHUNK_SAMPLES);
        for _ in 0..CHUNK_SAMPLES {
            out.push((self.phase.sin() * 8_000.0) as i16);
            self.phase += step;
        }
        Some(out)
    }
}
