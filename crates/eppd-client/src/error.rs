//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Connection to the supervisor failed.
    Connection(String),
    /// Protocol/framing error.
    Protocol(String),
    /// Request timed out.
    Timeout(String),
    /// Supervisor or worker failure.
    Server(String),
    /// The command was refused or the registry answered with an error.
    Command(String),
    /// Bad command-line input.
    InvalidInput(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
            Self::Server(msg) => write!(f, "server error: {}", msg),
            Self::Command(msg) => write!(f, "command failed: {}", msg),
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<eppd_core::ConfigError> for ClientError {
    fn from(err: eppd_core::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<eppd_protocol::ProtocolError> for ClientError {
    fn from(err: eppd_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<eppd_server::ServerError> for ClientError {
    fn from(err: eppd_server::ServerError) -> Self {
        match err {
            eppd_server::ServerError::Config(e) => Self::Config(e.to_string()),
            other => Self::Server(other.to_string()),
        }
    }
}
