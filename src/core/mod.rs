pub mod base;
pub mod bridge;
pub(crate) mod session;
pub mod synthesis;
pub mod transcription;

pub use base::{DEFAULT_CHANNEL_CAPACITY, StreamError, StreamResult, StreamState};
