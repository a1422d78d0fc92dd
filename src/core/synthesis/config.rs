//! Configuration types for the streaming speech synthesis connection.
//!
//! This module contains all configuration-related types including:
//! - Output audio format selection
//! - Voice rendering parameters
//! - Generation scheduling knobs
//! - WebSocket URL construction

use std::str::FromStr;

use serde::Serialize;

use crate::core::base::{DEFAULT_CHANNEL_CAPACITY, StreamError, StreamResult};
use crate::core::session::build_ws_url;
use url::Url;

/// Highest accepted latency-optimization level.
pub const MAX_LATENCY_LEVEL: u8 = 4;

// =============================================================================
// Output Format
// =============================================================================

/// Output audio formats for synthesized speech.
///
/// The server streams audio back in this format; the client treats the
/// payloads as opaque bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// MP3 at 44.1kHz, 128kbps (default)
    #[default]
    Mp3_44100,
    /// Raw PCM signed 16-bit little-endian at 16kHz
    Pcm16000,
    /// Raw PCM signed 16-bit little-endian at 22.05kHz
    Pcm22050,
    /// Raw PCM signed 16-bit little-endian at 24kHz
    Pcm24000,
    /// Raw PCM signed 16-bit little-endian at 44.1kHz
    Pcm44100,
    /// PCM mu-law at 8kHz (telephony)
    Ulaw8000,
}

impl OutputFormat {
    /// Convert to the API query parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3_44100 => "mp3_44100_128",
            Self::Pcm16000 => "pcm_16000",
            Self::Pcm22050 => "pcm_22050",
            Self::Pcm24000 => "pcm_24000",
            Self::Pcm44100 => "pcm_44100",
            Self::Ulaw8000 => "ulaw_8000",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    /// Parse from a format string (case-insensitive).
    /// Returns Ok(Self::Mp3_44100) as default for unknown values.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "pcm_16000" => Self::Pcm16000,
            "pcm_22050" => Self::Pcm22050,
            "pcm_24000" => Self::Pcm24000,
            "pcm_44100" => Self::Pcm44100,
            "ulaw_8000" | "ulaw" => Self::Ulaw8000,
            _ => Self::Mp3_44100,
        })
    }
}

// =============================================================================
// Voice Settings
// =============================================================================

/// Voice rendering parameters sent in the initial configuration frame.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0); lower values are more expressive
    pub stability: f32,
    /// Adherence to the original voice (0.0 to 1.0)
    pub similarity_boost: f32,
    /// Style exaggeration (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f32>,
    /// Boost similarity to the original speaker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: None,
            use_speaker_boost: None,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Configuration for one streaming synthesis connection.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Base HTTPS origin of the service (e.g. `https://api.example.com`).
    pub endpoint: String,

    /// API key attached as a header during the handshake.
    pub api_key: String,

    /// Voice to synthesize with; part of the connection path.
    pub voice_id: String,

    /// Model identifier (e.g. a multilingual or turbo model).
    pub model_id: String,

    /// Output audio format for the inbound stream.
    pub output_format: OutputFormat,

    /// Latency optimization level (0-4).
    ///
    /// Higher levels trade quality for time-to-first-byte.
    pub latency_level: u8,

    /// Enable server-side SSML parsing of the submitted text.
    pub enable_ssml_parsing: bool,

    /// ISO language code hint. Empty means server default.
    pub language_code: String,

    /// Seconds of inactivity before the server closes the connection.
    pub inactivity_timeout: Option<u32>,

    /// Voice rendering parameters, sent in the initial frame.
    pub voice_settings: Option<VoiceSettings>,

    /// Buffered-character thresholds at which the server starts generating.
    pub chunk_length_schedule: Option<Vec<u32>>,

    /// Pronunciation dictionary identifiers applied to this session.
    pub pronunciation_dictionary_locators: Vec<String>,

    /// Capacity of each typed output channel.
    pub channel_capacity: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            voice_id: String::new(),
            model_id: String::new(),
            output_format: OutputFormat::default(),
            latency_level: 0,
            enable_ssml_parsing: false,
            language_code: String::new(),
            inactivity_timeout: None,
            voice_settings: None,
            chunk_length_schedule: None,
            pronunciation_dictionary_locators: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SynthesisConfig {
    /// Validate the configuration before connecting.
    pub fn validate(&self) -> StreamResult<()> {
        if self.api_key.is_empty() {
            return Err(StreamError::AuthenticationFailed(
                "API key is required for streaming synthesis".to_string(),
            ));
        }
        if self.voice_id.is_empty() {
            return Err(StreamError::InvalidConfiguration(
                "voice_id must not be empty".to_string(),
            ));
        }
        if self.latency_level > MAX_LATENCY_LEVEL {
            return Err(StreamError::InvalidConfiguration(format!(
                "latency_level {} is outside supported range (0-{})",
                self.latency_level, MAX_LATENCY_LEVEL
            )));
        }
        if self.channel_capacity == 0 {
            return Err(StreamError::InvalidConfiguration(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the WebSocket URL with the per-voice streaming-input path and
    /// all non-empty configuration fields as query parameters.
    pub fn build_websocket_url(&self) -> StreamResult<Url> {
        let path = format!("/v1/text-to-speech/{}/stream-input", self.voice_id);

        let mut params: Vec<(&str, String)> = vec![
            ("model_id", self.model_id.clone()),
            ("output_format", self.output_format.as_str().to_string()),
            (
                "optimize_streaming_latency",
                self.latency_level.to_string(),
            ),
            ("language_code", self.language_code.clone()),
        ];
        if self.enable_ssml_parsing {
            params.push(("enable_ssml_parsing", "true".to_string()));
        }
        if let Some(timeout) = self.inactivity_timeout {
            params.push(("inactivity_timeout", timeout.to_string()));
        }

        build_ws_url(&self.endpoint, &path, &params)
    }
}
