//! Shared error and state types for the duplex streaming clients.
//!
//! Both streaming directions (synthesis and transcription) share one error
//! taxonomy and one connection state machine. Errors fall into two classes:
//! terminal errors returned synchronously from `connect`, and session errors
//! delivered through the error channel while the connection is live.

use thiserror::Error;

/// Default capacity of each typed output channel.
///
/// The dispatcher blocks once a consumer falls this many frames behind,
/// trading bounded memory for a potential dispatcher stall.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced by the streaming clients.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Connection to the service failed (DNS/TCP/TLS/handshake rejection)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The connection was closed; the operation never reached the wire
    #[error("Connection closed")]
    ConnectionClosed,

    /// Socket-level transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed inbound frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound frame could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error reported by the server inside a well-formed frame
    #[error("Server error: {0}")]
    Server(String),

    /// The driving operation was cancelled
    #[error("Cancelled")]
    Cancelled,
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of a streaming connection.
///
/// Transitions are one-way: `Running` -> `Draining` -> `Closed`. `Draining`
/// begins when either side initiates shutdown or the socket fails; buffered
/// frames already accepted into the output channels remain readable until the
/// consumer drains them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Connected, accepting sends, dispatching received frames
    #[default]
    Running,
    /// Shutdown initiated, in-flight frames still being flushed
    Draining,
    /// Terminal; all channels closed, socket released
    Closed,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Running => write!(f, "Running"),
            StreamState::Draining => write!(f, "Draining"),
            StreamState::Closed => write!(f, "Closed"),
        }
    }
}

impl StreamState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => StreamState::Running,
            1 => StreamState::Draining,
            _ => StreamState::Closed,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            StreamState::Running => 0,
            StreamState::Draining => 1,
            StreamState::Closed => 2,
        }
    }
}
