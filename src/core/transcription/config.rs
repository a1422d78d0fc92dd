//! Configuration types for the realtime transcription connection.

use std::str::FromStr;

use crate::core::base::{DEFAULT_CHANNEL_CAPACITY, StreamError, StreamResult};
use crate::core::session::build_ws_url;
use url::Url;

/// Minimum supported sample rate (8kHz for telephony)
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Maximum supported sample rate (48kHz for high-quality audio)
pub const MAX_SAMPLE_RATE: u32 = 48000;

// =============================================================================
// Audio Encoding
// =============================================================================

/// Supported encodings for the audio fed into the transcriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioEncoding {
    /// PCM signed 16-bit little-endian (default, most common)
    #[default]
    PcmS16le,
    /// PCM mu-law (telephony, 8kHz)
    PcmMulaw,
}

impl AudioEncoding {
    /// Convert to the value carried in the configuration frame.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PcmS16le => "pcm_s16le",
            Self::PcmMulaw => "pcm_mulaw",
        }
    }
}

impl FromStr for AudioEncoding {
    type Err = ();

    /// Parse from an encoding string (case-insensitive).
    /// Returns Ok(Self::PcmS16le) as default for unknown values.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "pcm_mulaw" | "mulaw" | "ulaw" => Self::PcmMulaw,
            _ => Self::PcmS16le,
        })
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Configuration for one realtime transcription connection.
///
/// Only the model identifier travels as a query parameter; sample rate and
/// encoding are carried in the initial configuration frame instead.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Base HTTPS origin of the service.
    pub endpoint: String,

    /// API key attached as a header during the handshake.
    pub api_key: String,

    /// Model identifier.
    pub model_id: String,

    /// Sample rate of the submitted audio, in Hz.
    pub sample_rate: u32,

    /// Encoding of the submitted audio.
    pub encoding: AudioEncoding,

    /// ISO language code hint. Empty means automatic detection.
    pub language_code: String,

    /// Deliver interim (revisable) transcripts in addition to final ones.
    pub enable_partials: bool,

    /// Include per-word timing in transcripts.
    pub enable_word_timestamps: bool,

    /// Maximum number of alternative transcriptions to return.
    pub max_alternatives: Option<u32>,

    /// Capacity of each typed output channel.
    pub channel_capacity: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: String::new(),
            sample_rate: 16000,
            encoding: AudioEncoding::default(),
            language_code: String::new(),
            enable_partials: true,
            enable_word_timestamps: true,
            max_alternatives: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TranscriptionConfig {
    /// Validate the configuration before connecting.
    pub fn validate(&self) -> StreamResult<()> {
        if self.api_key.is_empty() {
            return Err(StreamError::AuthenticationFailed(
                "API key is required for realtime transcription".to_string(),
            ));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(StreamError::InvalidConfiguration(format!(
                "Sample rate {} Hz is outside supported range ({}-{} Hz)",
                self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        if self.channel_capacity == 0 {
            return Err(StreamError::InvalidConfiguration(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the WebSocket URL for the realtime path.
    pub fn build_websocket_url(&self) -> StreamResult<Url> {
        build_ws_url(
            &self.endpoint,
            "/v1/speech-to-text/realtime",
            &[("model_id", self.model_id.clone())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> TranscriptionConfig {
        TranscriptionConfig {
            endpoint: "https://api.example.com".to_string(),
            api_key: "test_key".to_string(),
            model_id: "scribe-rt".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_encoding_as_str() {
        assert_eq!(AudioEncoding::PcmS16le.as_str(), "pcm_s16le");
        assert_eq!(AudioEncoding::PcmMulaw.as_str(), "pcm_mulaw");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(
            "pcm_mulaw".parse::<AudioEncoding>().unwrap(),
            AudioEncoding::PcmMulaw
        );
        assert_eq!(
            "ulaw".parse::<AudioEncoding>().unwrap(),
            AudioEncoding::PcmMulaw
        );
        assert_eq!(
            "anything".parse::<AudioEncoding>().unwrap(),
            AudioEncoding::PcmS16le
        );
    }

    #[test]
    fn test_validate_empty_api_key() {
        let config = TranscriptionConfig {
            api_key: String::new(),
            ..base_config()
        };

        assert!(matches!(
            config.validate(),
            Err(StreamError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_validate_sample_rate_out_of_range() {
        let config = TranscriptionConfig {
            sample_rate: 4000,
            ..base_config()
        };
        assert!(config.validate().is_err());

        let config = TranscriptionConfig {
            sample_rate: 96000,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_websocket_url() {
        let url = base_config().build_websocket_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.example.com/v1/speech-to-text/realtime?model_id=scribe-rt"
        );
    }

    #[test]
    fn test_build_websocket_url_model_only() {
        // Sample rate and encoding travel in the config frame, not the URL.
        let config = TranscriptionConfig {
            sample_rate: 8000,
            encoding: AudioEncoding::PcmMulaw,
            language_code: "de".to_string(),
            ..base_config()
        };

        let url = config.build_websocket_url().unwrap();
        assert_eq!(url.query(), Some("model_id=scribe-rt"));
    }
}
