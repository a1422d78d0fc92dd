//! Wire frame types for the realtime transcription connection.
//!
//! - **Outgoing frames**: sent by the writer
//!   - [`ConfigFrame`]: session parameters, sent once right after the handshake
//!   - [`AudioFrame`]: one base64-encoded audio chunk
//!   - [`EndOfStreamFrame`]: no more audio is coming, finalize pending results
//!
//! - **Incoming frames**: a typed envelope classified into
//!   [`TranscriptionEvent`]s. Transcript frames may be partial (revisable) or
//!   final, and optionally carry word-level timing.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::TranscriptionConfig;
use crate::core::base::{StreamError, StreamResult};

// =============================================================================
// Outgoing Frames (Client to Server)
// =============================================================================

/// Initial configuration frame establishing server-side session state.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFrame {
    /// Message type identifier (always "config")
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub sample_rate: u32,
    pub encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    pub enable_partials: bool,
    pub enable_word_timestamps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alternatives: Option<u32>,
}

impl ConfigFrame {
    /// Build the configuration frame from the connection configuration.
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            message_type: "config",
            sample_rate: config.sample_rate,
            encoding: config.encoding.as_str(),
            language_code: if config.language_code.is_empty() {
                None
            } else {
                Some(config.language_code.clone())
            },
            enable_partials: config.enable_partials,
            enable_word_timestamps: config.enable_word_timestamps,
            max_alternatives: config.max_alternatives,
        }
    }
}

/// One chunk of audio, base64-encoded for the JSON wire format.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFrame {
    /// Message type identifier (always "audio")
    #[serde(rename = "type")]
    pub message_type: &'static str,
    /// Base64-encoded audio payload
    pub audio: String,
}

impl AudioFrame {
    /// Encode raw audio bytes into a frame.
    pub fn from_bytes(audio: &[u8]) -> Self {
        Self {
            message_type: "audio",
            audio: BASE64_STANDARD.encode(audio),
        }
    }
}

/// Signal that no more audio is coming for this session.
#[derive(Debug, Clone, Serialize)]
pub struct EndOfStreamFrame {
    /// Message type identifier (always "end_of_stream")
    #[serde(rename = "type")]
    pub message_type: &'static str,
}

impl Default for EndOfStreamFrame {
    fn default() -> Self {
        Self {
            message_type: "end_of_stream",
        }
    }
}

// =============================================================================
// Incoming Frames (Server to Client)
// =============================================================================

/// Word-level timing for a transcribed word.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Word {
    /// The transcribed word text
    pub word: String,
    /// Start offset in seconds from the beginning of the audio stream
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
    /// Confidence score for this word (0.0 to 1.0)
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Speaker label when diarization is active
    #[serde(default)]
    pub speaker: Option<String>,
}

/// One transcription result, partial or final.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// The transcribed text
    pub text: String,
    /// Whether this result is stable and will not be revised
    pub is_final: bool,
    /// Overall confidence (0.0 to 1.0) when reported
    pub confidence: Option<f32>,
    /// Word-level detail when word timestamps are enabled
    pub words: Vec<Word>,
    /// Detected or configured language
    pub language_code: Option<String>,
    /// Start of the covered audio range, in seconds
    pub start_time: Option<f64>,
    /// End of the covered audio range, in seconds
    pub end_time: Option<f64>,
}

/// Response envelope; which fields are populated varies per frame.
#[derive(Debug, Deserialize)]
struct TranscriptionEnvelope {
    #[serde(rename = "type", default)]
    message_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    is_final: Option<bool>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    words: Option<Vec<Word>>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One classified event decoded from an inbound frame.
#[derive(Debug, Clone)]
pub enum TranscriptionEvent {
    /// A partial or final transcription result
    Transcript(Transcript),
    /// Error reported by the server
    Error(String),
    /// A frame carrying nothing this client consumes (keepalives and
    /// forward-compatible message types)
    Ignored,
}

impl TranscriptionEvent {
    /// Decode one inbound text frame.
    ///
    /// An envelope carrying an error field decodes to `Error` regardless of
    /// what else is present; transcript or word data decodes to `Transcript`.
    pub fn decode(text: &str) -> StreamResult<TranscriptionEvent> {
        let envelope: TranscriptionEnvelope = serde_json::from_str(text)
            .map_err(|e| StreamError::Decode(format!("Malformed transcription frame: {e}")))?;

        if let Some(error) = envelope.error.or(envelope.message) {
            return Ok(TranscriptionEvent::Error(error));
        }

        if envelope.text.is_some() || envelope.words.is_some() {
            let is_final = envelope.is_final.unwrap_or(false)
                || envelope.message_type.as_deref() == Some("final_transcript");

            return Ok(TranscriptionEvent::Transcript(Transcript {
                text: envelope.text.unwrap_or_default(),
                is_final,
                confidence: envelope.confidence,
                words: envelope.words.unwrap_or_default(),
                language_code: envelope.language_code,
                start_time: envelope.start_time,
                end_time: envelope.end_time,
            }));
        }

        Ok(TranscriptionEvent::Ignored)
    }
}

// =============================================================================
// Tests
// =============================================================================
