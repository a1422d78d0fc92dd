//! Real-time duplex voice streaming client.
//!
//! This crate drives two kinds of long-lived bidirectional WebSocket
//! sessions against a voice service:
//!
//! - **Streaming synthesis** ([`SynthesisStream`]): text chunks in, audio
//!   and character-timing frames out.
//! - **Realtime transcription** ([`TranscriptionStream`]): audio chunks in,
//!   partial and final transcripts out.
//!
//! Both directions share one concurrency model: writer calls serialize
//! through a single write lock and reach the wire in lock-acquisition order,
//! while one dispatcher task per connection decodes inbound frames and fans
//! them out to bounded typed channels. Shutdown closes every output channel
//! exactly once, whether triggered by the caller, a socket failure, or the
//! remote peer.
//!
//! The [`crate::core::bridge`] module adapts channel-based producers onto a
//! connection and guarantees no tail output is lost after input exhaustion;
//! [`crate::utils::audio_io`] decouples byte-stream collaborators from the
//! wire format.

pub mod core;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::base::{DEFAULT_CHANNEL_CAPACITY, StreamError, StreamResult, StreamState};
pub use crate::core::bridge;
pub use crate::core::synthesis::{
    Alignment, OutputFormat, SynthesisConfig, SynthesisStream, VoiceSettings,
};
pub use crate::core::transcription::{
    AudioEncoding, Transcript, TranscriptionConfig, TranscriptionStream, Word,
};
