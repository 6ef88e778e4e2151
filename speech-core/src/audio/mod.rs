//! C2-C4: the per-session audio pipeline — noise suppression, VAD, chunking.

pub mod chunker;
pub mod noise_suppressor;
pub mod resample;
pub mod vad;

pub use chunker::SmartChunker;
pub use noise_suppressor::NoiseSuppressor;
pub use vad::Vad;
