//! Error taxonomy for the transport, audio pipeline, and recognizer.

use thiserror::Error;

/// All recoverable and terminal faults the core can raise.
///
/// Recovery policy for each variant is documented alongside it; callers that
/// only care whether a fault is user-visible can match on [`SpeechError::is_terminal`].
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Signaling handshake failed. Caller may retry; mid-session this is
    /// handled internally by the reconnection loop.
    #[error("connect failed: {0}")]
    ConnectError(String),

    /// `send_audio`/`send_control` called while neither connected nor
    /// reconnecting. Not buffered.
    #[error("not connected")]
    NotConnected,

    /// Replay buffer was full; oldest entry dropped to make room.
    #[error("replay buffer overflow, dropped {dropped} chunk(s)")]
    BufferOverflow { dropped: u64 },

    /// Recognizer failed to decode an utterance. Session continues with an
    /// empty-text result carrying this error.
    #[error("recognition failed: {0}")]
    RecognitionError(#[from] RecognitionFailure),

    /// Recognizer was given zero samples.
    #[error("empty input to recognizer")]
    EmptyInput,

    /// Reconnection loop exhausted all `N` attempts.
    #[error("gave up after {attempts} reconnect attempts")]
    GaveUp { attempts: u32 },

    /// Malformed JSON or unrecognized envelope shape on the wire.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl SpeechError {
    /// Only `GaveUp` is a terminal, user-visible session fault; everything
    /// else is logged and the pipeline degrades or continues.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpeechError::GaveUp { .. })
    }
}

/// Boxed cause for a `RecognitionError`, kept distinct from `SpeechError`
/// itself so `whisper-rs`'s error type doesn't need to implement anything
/// beyond `std::error::Error`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RecognitionFailure(#[from] pub anyhow::Error);

pub type Result<T> = std::result::Result<T, SpeechError>;
