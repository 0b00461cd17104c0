//! Unix socket listener for front-end clients.
//!
//! Each accepted connection carries length-prefixed [`Envelope<Request>`]
//! messages and receives one [`Envelope<Response>`] per request.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use eppd_protocol::{
    Envelope, MAX_MESSAGE_SIZE, MAX_REPLY_SIZE, PROTOCOL_VERSION, ProtocolError, Request, Response,
    read_message, write_message,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Unix socket server for client connections.
pub struct SocketServer {
    config: ServerConfig,
    listener: UnixListener,
    /// Bounds concurrent connections.
    connection_semaphore: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds the socket path from the configuration.
    ///
    /// A leftover socket file nobody answers on is removed first when
    /// `cleanup_stale_socket` is set; a live one is an error.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if socket_path.exists() {
            if !config.cleanup_stale_socket || UnixStream::connect(socket_path).await.is_ok() {
                return Err(ServerError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            info!(path = %socket_path.display(), "Removing stale socket");
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(path = %socket_path.display(), "Socket server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Waits for a connection slot, then for a client.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self
            .connection_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Shutdown)?;

        let (stream, _addr) = self.listener.accept().await?;
        debug!("Accepted new connection");

        Ok(Connection {
            stream,
            timeout: self.config.connection_timeout,
            _permit: permit,
        })
    }

    /// Accept loop; each connection runs on its own task.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    tokio::spawn(handler(connection));
                }
                Err(ServerError::Shutdown) => return Err(ServerError::Shutdown),
                Err(e) => error!(error = %e, "Failed to accept connection"),
            }
        }
    }

    /// Runs the accept loop until `shutdown` completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let path = &self.config.socket_path;
        if path.exists() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed socket file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove socket file"),
            }
        }
    }
}

/// A client connection.
pub struct Connection {
    stream: UnixStream,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads a request envelope.
    ///
    /// Returns `Ok(None)` if the client closed the connection cleanly.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        let envelope = tokio::time::timeout(
            self.timeout,
            read_message::<Envelope<Request>, _>(&mut self.stream, MAX_MESSAGE_SIZE),
        )
        .await
        .map_err(|_| ProtocolError::timeout("read request"))??;

        if let Some(envelope) = &envelope
            && !envelope.is_compatible()
        {
            warn!(
                version = %envelope.protocol_version,
                expected = %PROTOCOL_VERSION,
                "Incompatible protocol version"
            );
        }
        Ok(envelope)
    }

    /// Writes a response envelope. Registry replies may be large, so the
    /// reply limit applies rather than the request limit.
    pub async fn write_response(&mut self, envelope: &Envelope<Response>) -> ServerResult<()> {
        tokio::time::timeout(
            self.timeout,
            write_message(&mut self.stream, envelope, MAX_REPLY_SIZE),
        )
        .await
        .map_err(|_| ProtocolError::timeout("write response"))??;
        Ok(())
    }

    pub async fn respond(&mut self, request_id: impl Into<String>, response: Response) -> ServerResult<()> {
        self.write_response(&Envelope::new(request_id, response)).await
    }
}
