//! Data-channel wire envelope: `{"type": ..., "timestamp": ..., "data": ...}`.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeechError};
use crate::model::{SessionSettings, TranscriptResult};

/// One message as it appears on the wire, tagged by `type`.
///
/// `data` is opaque at the envelope level; each variant below parses its own
/// `data` object. Round-tripping any variant through `to_json`/`from_json`
/// yields an equal value (R2).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    AudioChunk(AudioChunkPayload),
    ControlStart(Option<SessionSettings>),
    ControlStop,
    ControlPing,
    ControlPong,
    TranscriptFinal(TranscriptResult),
    Error(String),
    /// Signaling-only shapes, retained for wire compatibility (see SPEC_FULL.md §6).
    Offer(serde_json::Value),
    Answer(serde_json::Value),
    Ice(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChunkPayload {
    pub sample_rate: u32,
    pub channels: u8,
    /// Base64-encoded little-endian int16 PCM, always 6400 bytes decoded.
    pub data: String,
    pub sequence_id: u64,
}

impl AudioChunkPayload {
    pub fn from_samples(samples: &[i16], sequence_id: u64) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        Self {
            sample_rate: crate::model::CHUNK_SAMPLE_RATE,
            channels: 1,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            sequence_id,
        }
    }

    pub fn decode_samples(&self) -> Result<Vec<i16>> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| SpeechError::InvalidMessage(format!("bad base64 payload: {e}")))?;
        if bytes.len() % 2 != 0 {
            return Err(SpeechError::InvalidMessage(
                "PCM payload has odd byte length".into(),
            ));
        }
        Ok(bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect())
    }
}

/// Raw on-the-wire shape, used only for (de)serialization; [`Message`] is the
/// ergonomic type the rest of the crate works with.
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl Message {
    pub fn to_json(&self, timestamp_ms: u64) -> Result<String> {
        let (kind, data) = match self {
            Message::AudioChunk(p) => ("audio.chunk", Some(serde_json::to_value(p)?)),
            Message::ControlStart(settings) => (
                "control.start",
                settings
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
            ),
            Message::ControlStop => ("control.stop", None),
            Message::ControlPing => ("control.ping", None),
            Message::ControlPong => ("control.pong", None),
            Message::TranscriptFinal(result) => {
                let mut value = serde_json::to_value(result)?;
                if let serde_json::Value::Object(ref mut map) = value {
                    map.insert("is_final".into(), serde_json::Value::Bool(true));
                }
                ("transcript.final", Some(value))
            }
            Message::Error(msg) => ("error", Some(serde_json::json!({ "message": msg }))),
            Message::Offer(v) => ("offer", Some(v.clone())),
            Message::Answer(v) => ("answer", Some(v.clone())),
            Message::Ice(v) => ("ice", Some(v.clone())),
        };
        let envelope = WireEnvelope { kind: kind.to_string(), timestamp: timestamp_ms, data };
        Ok(serde_json::to_string(&envelope)?)
    }

    pub fn from_json(raw: &str) -> Result<(Self, u64)> {
        let envelope: WireEnvelope = serde_json::from_str(raw)
            .map_err(|e| SpeechError::InvalidMessage(e.to_string()))?;
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        let message = match envelope.kind.as_str() {
            "audio.chunk" => Message::AudioChunk(
                serde_json::from_value(data)
                    .map_err(|e| SpeechError::InvalidMessage(e.to_string()))?,
            ),
            "control.start" => {
                if data.is_null() {
                    Message::ControlStart(None)
                } else {
                    Message::ControlStart(Some(
                        serde_json::from_value(data)
                            .map_err(|e| SpeechError::InvalidMessage(e.to_string()))?,
                    ))
                }
            }
            "control.stop" => Message::ControlStop,
            "control.ping" => Message::ControlPing,
            "control.pong" => Message::ControlPong,
            "transcript.final" => Message::TranscriptFinal(
                serde_json::from_value(data)
                    .map_err(|e| SpeechError::InvalidMessage(e.to_string()))?,
            ),
            "error" => Message::Error(
                data.get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            ),
            "offer" => Message::Offer(data),
            "answer" => Message::Answer(data),
            "ice" => Message::Ice(data),
            other => {
                return Err(SpeechError::InvalidMessage(format!("unknown message type: {other}")))
            }
        };
        Ok((message, envelope.timestamp))
    }
}

impl From<serde_json::Error> for SpeechError {
    fn from(e: serde_json::Error) -> Self {
        SpeechError::InvalidMessage(e.to_string())
    }
}
