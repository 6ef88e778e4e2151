//! Real-time speech-to-text streaming pipeline: transport, noise suppression,
//! voice activity detection, chunking, and pooled recognition contexts.

pub mod audio;
pub mod config;
pub mod error;
pub mod model;
pub mod recognizer;
pub mod session;
pub mod transport;

pub use error::{Result, SpeechError};
