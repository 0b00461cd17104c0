//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised by the EPP frame codec and the IPC framing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message or frame exceeds the allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A frame header declares a length the codec cannot accept.
    #[error("invalid frame length {length} for a {header}-byte header")]
    InvalidFrameLength { length: usize, header: usize },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a message.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    #[error("empty message")]
    EmptyMessage,

    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Stable identifier used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageTooLarge { .. } => "message_too_large",
            Self::InvalidFrameLength { .. } => "invalid_frame_length",
            Self::Serialization(_) => "serialization",
            Self::UnsupportedVersion(_) => "unsupported_version",
            Self::Io(_) => "io",
            Self::IncompleteMessage { .. } => "incomplete_message",
            Self::EmptyMessage => "empty_message",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}
