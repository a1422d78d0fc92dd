//! Wire frame types for the streaming synthesis connection.
//!
//! This module contains all frame types exchanged over the socket:
//!
//! - **Outgoing frames**: sent by the writer
//!   - [`InitFrame`]: voice parameters, sent once right after the handshake
//!   - [`TextFrame`]: one text chunk, optionally tagged with a context ID
//!   - [`FlushFrame`]: finalize any buffered generation
//!   - [`TriggerFrame`]: force generation of buffered text immediately
//!   - [`CloseFrame`]: terminate the connection
//!
//! - **Incoming frames**: a single envelope whose populated fields determine
//!   the [`SynthesisEvent`]s it decodes into. Audio payloads are
//!   base64-decoded here; the rest of the crate only sees raw bytes.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::config::{SynthesisConfig, VoiceSettings};
use crate::core::base::{StreamError, StreamResult};

// =============================================================================
// Outgoing Frames (Client to Server)
// =============================================================================

/// Generation scheduling parameters carried by the initial frame.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    /// Buffered-character thresholds at which generation starts
    pub chunk_length_schedule: Vec<u32>,
}

/// Initial configuration frame.
///
/// Sent immediately after the socket opens, before any caller-supplied text,
/// to establish server-side session state.
#[derive(Debug, Clone, Serialize)]
pub struct InitFrame {
    /// Always a single space; identifies this as a keepalive-style frame
    pub text: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation_dictionary_locators: Option<Vec<String>>,
}

impl InitFrame {
    /// Build the initial frame from the connection configuration.
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            text: " ",
            voice_settings: config.voice_settings.clone(),
            generation_config: config
                .chunk_length_schedule
                .clone()
                .map(|schedule| GenerationConfig {
                    chunk_length_schedule: schedule,
                }),
            pronunciation_dictionary_locators: if config
                .pronunciation_dictionary_locators
                .is_empty()
            {
                None
            } else {
                Some(config.pronunciation_dictionary_locators.clone())
            },
        }
    }
}

/// One chunk of text to synthesize.
#[derive(Debug, Clone, Serialize)]
pub struct TextFrame<'a> {
    /// The text chunk
    pub text: &'a str,
    /// Conversation context this chunk belongs to, for multiplexed sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<&'a str>,
}

/// Finalize frame: no more input is coming, flush buffered generation.
#[derive(Debug, Clone, Serialize)]
pub struct FlushFrame {
    pub text: &'static str,
    pub flush: bool,
}

impl Default for FlushFrame {
    fn default() -> Self {
        Self {
            text: "",
            flush: true,
        }
    }
}

/// Force the server to start generating from buffered text immediately.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerFrame {
    pub text: &'static str,
    pub try_trigger_generation: bool,
}

impl Default for TriggerFrame {
    fn default() -> Self {
        Self {
            text: " ",
            try_trigger_generation: true,
        }
    }
}

/// Terminate the connection.
#[derive(Debug, Clone, Serialize)]
pub struct CloseFrame {
    pub close_connection: bool,
}

impl Default for CloseFrame {
    fn default() -> Self {
        Self {
            close_connection: true,
        }
    }
}

// =============================================================================
// Incoming Frames (Server to Client)
// =============================================================================

/// Per-character timing metadata correlating audio to the source text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alignment {
    /// Characters of the synthesized text
    #[serde(default)]
    pub characters: Vec<String>,
    /// Start offset of each character, in seconds
    #[serde(rename = "character_start_times_seconds", default)]
    pub start_times: Vec<f32>,
    /// End offset of each character, in seconds
    #[serde(rename = "character_end_times_seconds", default)]
    pub end_times: Vec<f32>,
}

/// Response envelope; which fields are populated varies per frame.
#[derive(Debug, Deserialize)]
struct SynthesisEnvelope {
    #[serde(default)]
    audio: Option<String>,
    #[serde(rename = "isFinal", default)]
    is_final: Option<bool>,
    #[serde(rename = "normalizedAlignment", default)]
    normalized_alignment: Option<Alignment>,
    #[serde(default)]
    alignment: Option<Alignment>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One classified event decoded from an inbound frame.
///
/// Produced only by the dispatcher; a single wire frame carrying both audio
/// and alignment data yields one event of each kind.
#[derive(Debug, Clone)]
pub enum SynthesisEvent {
    /// Decoded audio chunk
    Audio(Bytes),
    /// Character timing metadata
    Alignment(Alignment),
    /// The current generation is complete
    Final,
    /// Error reported by the server
    Error(String),
}

impl SynthesisEvent {
    /// Decode one inbound text frame into its events.
    ///
    /// An envelope carrying an error field decodes to exactly one `Error`
    /// event regardless of what else is present. Malformed JSON and invalid
    /// base64 both surface as [`StreamError::Decode`].
    pub fn decode(text: &str) -> StreamResult<Vec<SynthesisEvent>> {
        let envelope: SynthesisEnvelope = serde_json::from_str(text)
            .map_err(|e| StreamError::Decode(format!("Malformed synthesis frame: {e}")))?;

        if let Some(error) = envelope.error.or(envelope.message) {
            return Ok(vec![SynthesisEvent::Error(error)]);
        }

        let mut events = Vec::with_capacity(2);

        // Servers may send both raw and normalized alignment for the same
        // chunk; the normalized variant matches the submitted text.
        if let Some(alignment) = envelope.normalized_alignment.or(envelope.alignment) {
            events.push(SynthesisEvent::Alignment(alignment));
        }

        if let Some(audio) = envelope.audio.filter(|a| !a.is_empty()) {
            let bytes = BASE64_STANDARD
                .decode(audio.as_bytes())
                .map_err(|e| StreamError::Decode(format!("Invalid base64 audio payload: {e}")))?;
            events.push(SynthesisEvent::Audio(Bytes::from(bytes)));
        }

        if envelope.is_final == Some(true) {
            events.push(SynthesisEvent::Final);
        }

        Ok(events)
    }
}

// =============================================================================
// Tests
// =============================================================================
