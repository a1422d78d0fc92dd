//! Streaming speech synthesis over a duplex WebSocket connection.
//!
//! Text chunks are written incrementally (for example as a language model
//! produces them) while audio and character-timing frames stream back
//! concurrently on typed channels.

mod client;
mod config;
mod messages;

pub use client::SynthesisStream;
pub use config::{MAX_LATENCY_LEVEL, OutputFormat, SynthesisConfig, VoiceSettings};
pub use messages::{
    Alignment, CloseFrame, FlushFrame, GenerationConfig, InitFrame, SynthesisEvent, TextFrame,
    TriggerFrame,
};
