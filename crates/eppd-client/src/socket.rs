//! Unix socket client for the eppd supervisor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use eppd_protocol::{
    Envelope, MAX_MESSAGE_SIZE, MAX_REPLY_SIZE, Request, Response, read_message, write_message,
};

use crate::error::{ClientError, ClientResult};

/// Client for the supervisor socket.
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Creates a socket client with the default socket path.
    pub fn with_defaults() -> Self {
        Self::new(eppd_server::default_socket_path(), Duration::from_secs(60))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Sends a request and waits for a response.
    ///
    /// The timeout covers the whole exchange, including time spent queued
    /// behind other commands for the same registry.
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let envelope = Envelope::new(&request_id, request);

        debug!(
            socket = %self.socket_path.display(),
            request_id = %request_id,
            "connecting to supervisor"
        );

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "failed to connect to {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })?;

        let response = tokio::time::timeout(self.timeout, exchange(stream, &envelope))
            .await
            .map_err(|_| ClientError::Timeout("waiting for the supervisor".into()))??;

        if response.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %response.request_id,
                "response request_id mismatch"
            );
        }
        Ok(response.payload)
    }

    /// Pings the supervisor to check if it's alive.
    pub async fn ping(&self) -> bool {
        matches!(self.send(Request::Ping).await, Ok(Response::Pong))
    }
}

async fn exchange(
    mut stream: UnixStream,
    envelope: &Envelope<Request>,
) -> ClientResult<Envelope<Response>> {
    write_message(&mut stream, envelope, MAX_MESSAGE_SIZE).await?;
    debug!("request sent, waiting for response");

    let response: Envelope<Response> = read_message(&mut stream, MAX_REPLY_SIZE)
        .await?
        .ok_or_else(|| ClientError::Connection("supervisor closed the connection".into()))?;
    debug!(request_id = %response.request_id, "response received");
    Ok(response)
}
