//! Server error types.

use std::io;

use eppd_codec::{CodecError, DecodeError};
use eppd_core::ConfigError;
use eppd_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the connection to a registry.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connection refused or unreachable.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// The registry closed the connection.
    #[error("connection closed by peer")]
    PeerClosed,

    /// A previous exchange never completed.
    #[error("a request is already in flight on this connection")]
    RequestInFlight,

    /// The document could not be framed; nothing was sent.
    #[error("framing error: {0}")]
    Frame(#[from] ProtocolError),

    /// The registry sent bytes that do not form a frame.
    #[error("corrupt frame from registry: {0}")]
    Corrupt(ProtocolError),

    #[error("not connected")]
    NotConnected,
}

impl TransportError {
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Tls(_) => "tls",
            Self::Io(_) => "io",
            Self::PeerClosed => "peer_closed",
            Self::RequestInFlight => "request_in_flight",
            Self::Frame(_) => "frame",
            Self::Corrupt(_) => "corrupt_frame",
            Self::NotConnected => "not_connected",
        }
    }

    /// Whether the connection is unusable after this error.
    ///
    /// Any socket or framing failure once bytes are on the wire leaves the
    /// stream in an unknown position. A fatal error ends the worker process;
    /// the supervisor owns restarts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::Io(_) | Self::Corrupt(_))
    }
}

/// Errors raised by a registry session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Rejected before anything was sent.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A command other than `login` or `logout` without a session.
    #[error("attempted {command} while not logged in")]
    NotLoggedIn { command: String },
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Codec(e) => e.kind(),
            Self::Decode(e) => e.kind(),
            Self::Transport(e) => e.kind(),
            Self::NotLoggedIn { .. } => "session_state",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_fatal())
    }
}

/// Errors that can occur in the supervisor and worker processes.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket, file, child process).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding, timeouts).
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Socket path already in use.
    #[error("Socket path already in use: {path}")]
    SocketInUse { path: String },

    /// Socket path parent directory does not exist.
    #[error("Socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    /// Supervisor is already running.
    #[error("Supervisor is already running (PID file exists: {path})")]
    AlreadyRunning { path: String },

    /// The registry's worker is gone or never answered.
    #[error("Worker for registry `{registry}` is unavailable")]
    WorkerUnavailable { registry: String },

    /// The worker received something it cannot act on.
    #[error("Worker protocol violation: {message}")]
    WorkerProtocol { message: String },

    /// Shutdown requested.
    #[error("Server shutdown requested")]
    Shutdown,
}

impl ServerError {
    /// Creates a socket in use error.
    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    /// Creates a socket path invalid error.
    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }

    /// Creates an already running error.
    pub fn already_running(path: impl Into<String>) -> Self {
        Self::AlreadyRunning { path: path.into() }
    }

    pub fn worker_unavailable(registry: impl Into<String>) -> Self {
        Self::WorkerUnavailable {
            registry: registry.into(),
        }
    }

    pub fn worker_protocol(message: impl Into<String>) -> Self {
        Self::WorkerProtocol {
            message: message.into(),
        }
    }

    /// Stable identifier used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Protocol(e) => e.kind(),
            Self::Config(_) => "configuration",
            Self::Codec(e) => e.kind(),
            Self::Transport(e) => e.kind(),
            Self::Session(e) => e.kind(),
            Self::SocketInUse { .. } => "socket_in_use",
            Self::SocketPathInvalid { .. } => "socket_path_invalid",
            Self::AlreadyRunning { .. } => "already_running",
            Self::WorkerUnavailable { .. } => "worker_unavailable",
            Self::WorkerProtocol { .. } => "worker_protocol",
            Self::Shutdown => "shutdown",
        }
    }
}
