//! C3: per-frame energy-based voice activity detection (spec §4.3).

use crate::model::VadFrameState;

/// 10ms at 16kHz.
pub const FRAME_SAMPLES: usize = 160;
const FRAME_DURATION_MS: u32 = 10;

/// Energy-threshold VAD with the accumulators the Smart Chunker reads to
/// decide when an utterance boundary has been reached.
pub struct Vad {
    energy_threshold: f32,
    state: VadFrameState,
}

impl Vad {
    pub fn new(energy_threshold: f32) -> Self {
        Self { energy_threshold, state: VadFrameState::default() }
    }

    /// Classifies one 160-sample frame and updates the accumulators.
    /// Returns `true` if the frame was classified as speech.
    ///
    /// Frames shorter than [`FRAME_SAMPLES`] (e.g. a trailing partial frame
    /// at flush time) are still classified on whatever energy they carry.
    pub fn process_frame(&mut self, frame: &[i16]) -> bool {
        let rms = rms_energy(frame);
        let is_speech = rms >= self.energy_threshold;

        if is_speech {
            self.state.consecutive_speech += 1;
            self.state.consecutive_silence = 0;
            self.state.speech_duration_ms += FRAME_DURATION_MS;
            self.state.silence_duration_ms = 0;
        } else {
            self.state.consecutive_silence += 1;
            self.state.consecutive_speech = 0;
            self.state.silence_duration_ms += FRAME_DURATION_MS;
            // speech_duration_ms is deliberately NOT reset on silence.
        }
        self.state.last_was_speech = is_speech;
        is_speech
    }

    /// True once accumulated trailing silence reaches `silence_threshold_ms`.
    pub fn should_chunk(&self, silence_threshold_ms: u32) -> bool {
        self.state.silence_duration_ms >= silence_threshold_ms
    }

    pub fn state(&self) -> VadFrameState {
        self.state
    }

    /// Called at utterance boundaries to zero all accumulators.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

/// `sqrt(mean(x^2))` over a frame of int16 samples.
pub fn rms_energy(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum_sq / frame.len() as f64).sqrt()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_frame() -> Vec<i16> {
        vec![0; FRAME_SAMPLES]
    }

    fn loud_frame(amplitude: i16) -> Vec<i16> {
        vec![amplitude; FRAME_SAMPLES]
    }

    #[test]
    fn silence_below_threshold_is_not_speech() {
        let mut vad = Vad::new(300.0);
        assert!(!vad.process_frame(&silent_frame()));
        assert_eq!(vad.state().speech_duration_ms, 0);
        assert_eq!(vad.state().silence_duration_ms, 10);
    }

    #[test]
    fn loud_frame_above_threshold_is_speech() {
        let mut vad = Vad::new(300.0);
        assert!(vad.process_frame(&loud_frame(1000)));
        assert_eq!(vad.state().speech_duration_ms, 10);
        assert_eq!(vad.state().silence_duration_ms, 0);
    }

    #[test]
    fn speech_duration_is_not_reset_by_silence() {
        let mut vad = Vad::new(300.0);
        vad.process_frame(&loud_frame(1000));
        vad.process_frame(&silent_frame());
        assert_eq!(vad.state().speech_duration_ms, 10);
        assert_eq!(vad.state().silence_duration_ms, 10);
    }

    #[test]
    fn should_chunk_fires_once_silence_threshold_reached() {
        let mut vad = Vad::new(300.0);
        for _ in 0..99 {
            vad.process_frame(&silent_frame());
        }
        assert!(!vad.should_chunk(1000));
        vad.process_frame(&silent_frame());
        assert!(vad.should_chunk(1000));
    }

    #[test]
    fn reset_clears_all_accumulators() {
        let mut vad = Vad::new(300.0);
        vad.process_frame(&loud_frame(1000));
        vad.reset();
        assert_eq!(vad.state(), VadFrameState::default());
    }

    #[test]
    fn empty_frame_is_silence() {
        let mut vad = Vad::new(300.0);
        assert!(!vad.process_frame(&[]));
    }
}
