//! Realtime speech transcription over a duplex WebSocket connection.
//!
//! Audio chunks are written incrementally (for example from a microphone)
//! while partial and final transcripts stream back concurrently.

mod client;
mod config;
mod messages;

pub use client::TranscriptionStream;
pub use config::{
    AudioEncoding, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE, TranscriptionConfig,
};
pub use messages::{
    AudioFrame, ConfigFrame, EndOfStreamFrame, Transcript, TranscriptionEvent, Word,
};
