//! Request routing for the supervisor socket.
//!
//! Commands go through the worker pool; everything else is answered by the
//! supervisor itself.

use std::sync::Arc;
use std::time::Instant;

use tracing::{Span, debug, info, warn};

use eppd_protocol::{Request, Response, WorkerRequest};

use crate::error::{ServerError, ServerResult};
use crate::pool::{PoolHandle, WorkerChannel};
use crate::signals::ShutdownHandle;
use crate::socket::Connection;
use crate::transport::BoxFuture;

/// Routes requests for every connection.
pub struct RequestHandler<W> {
    pool: PoolHandle<W>,
    registries: Arc<Vec<String>>,
    shutdown: ShutdownHandle,
}

impl<W> Clone for RequestHandler<W> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            registries: self.registries.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<W: WorkerChannel> RequestHandler<W> {
    pub fn new(pool: PoolHandle<W>, registries: Vec<String>, shutdown: ShutdownHandle) -> Self {
        Self {
            pool,
            registries: Arc::new(registries),
            shutdown,
        }
    }

    /// Handles a single request and returns the response.
    #[tracing::instrument(skip(self, request), fields(request_type, duration_ms))]
    pub async fn handle(&self, request: &Request) -> Response {
        let start = Instant::now();
        let request_type = request_type(request);
        Span::current().record("request_type", request_type);

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Registries => Response::Registries {
                names: self.registries.to_vec(),
            },
            Request::Command {
                registry,
                command,
                data,
            } => {
                if !self.registries.iter().any(|r| r == registry) {
                    warn!(registry = %registry, "Unknown registry");
                    Response::error("unknown_registry", format!("Unknown registry `{}`", registry))
                } else {
                    let request = WorkerRequest::command(command.clone(), data.clone());
                    let response = match self.pool.dispatch(registry, request).await {
                        Ok(reply) => Response::Reply { reply },
                        Err(e) => {
                            warn!(registry = %registry, command = %command, error = %e, "Command failed");
                            Response::error(e.kind(), e.to_string())
                        }
                    };
                    info!(
                        registry = %registry,
                        command = %command,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Processed EPP request"
                    );
                    response
                }
            }
            Request::Shutdown => {
                info!("Handling Shutdown request");
                self.shutdown.trigger();
                Response::ShuttingDown
            }
        };

        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis() as u64);
            debug!(request_type, duration_ms = duration.as_millis() as u64, "Request handled");
        }
        response
    }

    /// Serves a connection until the client leaves or shutdown is requested.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    let response = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, response).await?;
                    if self.shutdown.is_shutdown() {
                        return Err(ServerError::Shutdown);
                    }
                }
                Ok(None) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Error reading request");
                    return Err(e);
                }
            }
        }
    }
}

fn request_type(request: &Request) -> &'static str {
    match request {
        Request::Command { .. } => "command",
        Request::Registries => "registries",
        Request::Shutdown => "shutdown",
        Request::Ping => "ping",
    }
}

/// Builds the per-connection closure for [`SocketServer::run`](crate::socket::SocketServer::run).
pub fn make_connection_handler<W: WorkerChannel>(
    handler: RequestHandler<W>,
) -> impl Fn(Connection) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    move |conn| {
        let handler = handler.clone();
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                warn!(error = %e, "Connection handler error");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::spawn_pool;
    use crate::pool::testing::EchoWorker;
    use crate::signals::SignalHandler;
    use eppd_protocol::WorkerReply;
    use serde_json::json;

    async fn handler() -> (RequestHandler<EchoWorker>, SignalHandler) {
        let pool = spawn_pool::<EchoWorker>();
        pool.register("registry-test1", EchoWorker::default()).await.unwrap();
        let signals = SignalHandler::new();
        let handler = RequestHandler::new(
            pool,
            vec!["registry-test1".to_string(), "registry-test2".to_string()],
            signals.shutdown_handle(),
        );
        (handler, signals)
    }

    #[tokio::test]
    async fn ping_and_registries() {
        let (handler, _signals) = handler().await;
        assert_eq!(handler.handle(&Request::Ping).await, Response::Pong);
        assert_eq!(
            handler.handle(&Request::Registries).await,
            Response::Registries {
                names: vec!["registry-test1".to_string(), "registry-test2".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn commands_are_routed_to_the_worker() {
        let (handler, _signals) = handler().await;
        let response = handler
            .handle(&Request::command(
                "registry-test1",
                "checkDomain",
                json!({"name": "example.com"}),
            ))
            .await;
        assert_eq!(
            response,
            Response::Reply {
                reply: WorkerReply::Ok {
                    response: json!({"command": "checkDomain", "data": {"name": "example.com"}})
                }
            }
        );
    }

    #[tokio::test]
    async fn unknown_registry_is_an_error() {
        let (handler, _signals) = handler().await;
        match handler
            .handle(&Request::command("nope", "hello", json!(null)))
            .await
        {
            Response::Error { error } => assert_eq!(error.kind, "unknown_registry"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn shutdown_triggers_the_signal() {
        let (handler, signals) = handler().await;
        assert_eq!(handler.handle(&Request::Shutdown).await, Response::ShuttingDown);
        assert!(signals.is_shutdown());
    }
}
