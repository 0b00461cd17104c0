//! Codec error types.

use thiserror::Error;

/// Result type for command rendering.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while turning a command payload into an EPP document.
///
/// All of them are raised before any byte is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The caller's payload is unusable.
    #[error("{0}")]
    Validation(String),

    /// No builder exists for the command name.
    #[error("unknown EPP command: {0}")]
    UnknownCommand(String),

    /// The registry configuration cannot support the command.
    #[error("configuration error: {0}")]
    Config(String),

    /// The element tree could not be serialized.
    #[error("failed to render XML: {0}")]
    Render(String),
}

impl CodecError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable identifier used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Config(_) => "configuration",
            Self::Render(_) => "render",
        }
    }
}

/// Errors raised while decoding a registry response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("response is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("response contains no root element")]
    Empty,
}

impl DecodeError {
    pub fn kind(&self) -> &'static str {
        "decode"
    }
}
