//! C4: VAD-driven "smart chunking" into utterance-sized segments (spec §4.4).

use crate::audio::vad::{Vad, FRAME_SAMPLES};
use crate::model::{SessionSettings, UtteranceChunk};

/// Accumulates denoised int16 samples and emits [`UtteranceChunk`]s on VAD
/// boundaries. Emission is exposed as a return value from [`append`] /
/// [`flush`] rather than a callback: the Session Manager is the one that
/// spawns a task per emitted chunk (see §5 "suspension points"), keeping
/// this type callback-free and trivially unit-testable.
pub struct SmartChunker {
    buffer: Vec<i16>,
    frame_residual: Vec<i16>,
    vad: Vad,
    settings: SessionSettings,
}

impl SmartChunker {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            buffer: Vec::new(),
            frame_residual: Vec::new(),
            vad: Vad::new(settings.vad_energy_threshold),
            settings,
        }
    }

    /// Appends samples, feeding the VAD 160-sample frames as they become
    /// available, and returns an emitted [`UtteranceChunk`] if the
    /// emit-decision rule fires.
    pub fn append(&mut self, samples: &[i16]) -> Option<UtteranceChunk> {
        self.buffer.extend_from_slice(samples);
        self.frame_residual.extend_from_slice(samples);

        while self.frame_residual.len() >= FRAME_SAMPLES {
            let frame: Vec<i16> = self.frame_residual.drain(..FRAME_SAMPLES).collect();
            self.vad.process_frame(&frame);
        }

        self.maybe_emit()
    }

    fn buffer_duration_ms(&self) -> u32 {
        (self.buffer.len() / 16) as u32 // 16 samples/ms at 16kHz
    }

    fn speech_sufficient(&self) -> bool {
        let speech_ms = self.vad.state().speech_duration_ms;
        if speech_ms >= 1_000 {
            return true;
        }
        if speech_ms == 0 {
            return false;
        }
        let total_ms = self.buffer_duration_ms();
        if total_ms == 0 {
            return false;
        }
        (speech_ms as f32 / total_ms as f32) >= self.settings.speech_density_threshold
    }

    fn maybe_emit(&mut self) -> Option<UtteranceChunk> {
        let duration_ms = self.buffer_duration_ms();

        if duration_ms >= self.settings.max_chunk_duration_ms {
            return Some(self.emit());
        }

        if self.vad.should_chunk(self.settings.silence_threshold_ms)
            && duration_ms >= self.settings.min_chunk_duration_ms
            && self.speech_sufficient()
        {
            return Some(self.emit());
        }

        None
    }

    fn emit(&mut self) -> UtteranceChunk {
        let total_duration_ms = self.buffer_duration_ms();
        let speech_duration_ms = self.vad.state().speech_duration_ms;
        let samples = std::mem::take(&mut self.buffer);
        self.frame_residual.clear();
        self.vad.reset();
        UtteranceChunk { samples, total_duration_ms, speech_duration_ms }
    }

    /// Applies the same `speech_sufficient` predicate to whatever remains
    /// buffered. Emits only if it holds; otherwise the trailing partial
    /// utterance is discarded (prevents a hallucinated trailing "thank you").
    pub fn flush(&mut self) -> Option<UtteranceChunk> {
        if self.buffer.is_empty() {
            return None;
        }
        if self.speech_sufficient() {
            Some(self.emit())
        } else {
            self.buffer.clear();
            self.frame_residual.clear();
            self.vad.reset();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            vad_energy_threshold: 300.0,
            silence_threshold_ms: 1_000,
            min_chunk_duration_ms: 500,
            max_chunk_duration_ms: 30_000,
            speech_density_threshold: 0.6,
        }
    }

    fn speech_frame() -> Vec<i16> {
        vec![2_000; FRAME_SAMPLES]
    }

    fn silence_frame() -> Vec<i16> {
        vec![0; FRAME_SAMPLES]
    }

    #[test]
    fn silence_only_never_emits() {
        // S3
        let mut chunker = SmartChunker::new(settings());
        for _ in 0..500 {
            assert!(chunker.append(&silence_frame()).is_none());
        }
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn speech_then_silence_emits_one_chunk() {
        // S1-style: enough speech then trailing silence reaches should_chunk.
        let mut chunker = SmartChunker::new(settings());
        let mut emitted = None;
        for _ in 0..150 {
            // 1.5s speech
            if let Some(c) = chunker.append(&speech_frame()) {
                emitted = Some(c);
            }
        }
        for _ in 0..100 {
            // 1.0s trailing silence, crosses silence_threshold_ms at frame 100
            if let Some(c) = chunker.append(&silence_frame()) {
                emitted = Some(c);
            }
        }
        let chunk = emitted.expect("expected one emitted chunk");
        assert!(chunk.speech_duration_ms >= 1_000);
    }

    #[test]
    fn max_duration_forces_emit_even_without_should_chunk() {
        let mut settings = settings();
        settings.max_chunk_duration_ms = 500;
        let mut chunker = SmartChunker::new(settings);
        let mut emitted = None;
        for _ in 0..50 {
            // 500ms of continuous speech, should_chunk never true (no silence)
            if let Some(c) = chunker.append(&speech_frame()) {
                emitted = Some(c);
            }
        }
        assert!(emitted.is_some(), "max duration cap must force an emit");
    }

    #[test]
    fn short_utterance_gated_by_density_threshold() {
        // S4: 600ms speech + 1.2s silence, total ~1.8s, density ~0.33.
        let mut low_density = settings();
        low_density.speech_density_threshold = 0.6;
        let mut chunker = SmartChunker::new(low_density);
        let mut emitted = None;
        for _ in 0..60 {
            if let Some(c) = chunker.append(&speech_frame()) {
                emitted = Some(c);
            }
        }
        for _ in 0..120 {
            if let Some(c) = chunker.append(&silence_frame()) {
                emitted = Some(c);
            }
        }
        assert!(emitted.is_none(), "density 0.33 < 0.6 threshold must not emit");

        let mut high_density = settings();
        high_density.speech_density_threshold = 0.3;
        let mut chunker = SmartChunker::new(high_density);
        let mut emitted = None;
        for _ in 0..60 {
            if let Some(c) = chunker.append(&speech_frame()) {
                emitted = Some(c);
            }
        }
        for _ in 0..120 {
            if let Some(c) = chunker.append(&silence_frame()) {
                emitted = Some(c);
            }
        }
        assert!(emitted.is_some(), "density 0.33 >= 0.3 threshold must emit");
    }

    #[test]
    fn flush_with_zero_speech_does_not_emit() {
        let mut chunker = SmartChunker::new(settings());
        for _ in 0..10 {
            chunker.append(&silence_frame());
        }
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn flush_with_sufficient_speech_emits() {
        let mut chunker = SmartChunker::new(settings());
        for _ in 0..150 {
            chunker.append(&speech_frame());
        }
        // No trailing silence reached should_chunk yet; flush should still
        // emit because speech_sufficient holds.
        assert!(chunker.flush().is_some());
    }
}
