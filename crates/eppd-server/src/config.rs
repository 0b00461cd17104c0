//! Supervisor socket configuration.

use std::path::PathBuf;
use std::time::Duration;

use eppd_core::DaemonSettings;

/// Front-end socket configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// Per-message read/write timeout on front-end connections.
    pub connection_timeout: Duration,

    /// Maximum concurrent front-end connections.
    pub max_connections: usize,

    /// Whether to remove a stale socket on startup.
    pub cleanup_stale_socket: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(30),
            max_connections: 100,
            cleanup_stale_socket: true,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    /// Applies the `[daemon]` section of the configuration file.
    pub fn from_settings(settings: &DaemonSettings) -> Self {
        Self {
            socket_path: settings
                .socket_path
                .clone()
                .unwrap_or_else(default_socket_path),
            connection_timeout: Duration::from_secs(settings.timeout),
            ..Default::default()
        }
    }

    /// Builder: set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: set cleanup stale socket.
    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }
}

/// Returns the default socket path.
///
/// `$XDG_RUNTIME_DIR/eppd.sock` when set, `/tmp/eppd-$UID.sock` otherwise.
pub fn default_socket_path() -> PathBuf {
    runtime_path("sock")
}

pub(crate) fn runtime_path(extension: &str) -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join(format!("eppd.{}", extension))
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/eppd-{}.{}", uid, extension))
    }
}
