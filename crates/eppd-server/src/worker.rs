//! Registry worker runtime (`eppd worker`).
//!
//! A worker serves one registry. It reads length-prefixed JSON requests on
//! stdin and answers each with exactly one [`WorkerReply`] on stdout:
//!
//! 1. `{"registry": "<name>"}` once, which connects and logs in;
//! 2. then `{"command": "...", "data": {...}}` for every command.
//!
//! The keepalive ticks in the same loop as requests, so a `hello` never
//! overlaps a command. The worker exits after a terminating logout or a fatal
//! transport error; restarting it is the supervisor's job.

use eppd_protocol::{
    MAX_MESSAGE_SIZE, MAX_REPLY_SIZE, ProtocolResult, WorkerReply, WorkerRequest, read_message,
    write_message,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{ServerError, ServerResult, SessionError};
use crate::transport::Transport;

/// Why a worker loop ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// A logout with `kill` was answered.
    Terminated,
    /// Stdin closed.
    InputClosed,
}

/// Reads requests on a dedicated task so the main loop can `select!` on a
/// channel, which is cancel safe, instead of on a partial read.
fn spawn_reader<R>(mut reader: R) -> mpsc::Receiver<ProtocolResult<WorkerRequest>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            let message = read_message::<WorkerRequest, _>(&mut reader, MAX_MESSAGE_SIZE).await;
            let done = !matches!(message, Ok(Some(_)));
            let forwarded = match message {
                Ok(Some(request)) => tx.send(Ok(request)).await,
                Ok(None) => break,
                Err(e) => tx.send(Err(e)).await,
            };
            if done || forwarded.is_err() {
                break;
            }
        }
    });
    rx
}

fn error_reply(error: &SessionError) -> WorkerReply {
    WorkerReply::error(error.kind(), error.to_string())
}

/// Runs a worker until it terminates or its input closes.
///
/// `connect` builds the dispatcher once the registry name is known.
pub async fn run_worker<T, R, W, F>(reader: R, mut writer: W, connect: F) -> ServerResult<WorkerExit>
where
    T: Transport,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    F: FnOnce(&str) -> ServerResult<Dispatcher<T>>,
{
    let mut requests = spawn_reader(reader);

    let registry = match requests.recv().await.transpose()? {
        Some(WorkerRequest::Init { registry }) => registry,
        Some(WorkerRequest::Command { command, .. }) => {
            return Err(ServerError::worker_protocol(format!(
                "received `{}` before the registry name",
                command
            )));
        }
        None => return Ok(WorkerExit::InputClosed),
    };

    let mut dispatcher = connect(&registry)?;
    if let Err(e) = dispatcher.start().await {
        error!(registry = %registry, error = %e, "Failed to start session");
        if matches!(e, SessionError::Transport(_)) {
            return Err(e.into());
        }
    }

    let mut ticker = tokio::time::interval(dispatcher.session().heartbeat_settings().check_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = dispatcher.heartbeat().await {
                    warn!(registry = %registry, error = %e, "Keepalive failed");
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                }
            }
            request = requests.recv() => {
                let Some(request) = request.transpose()? else {
                    info!(registry = %registry, "Input closed, stopping worker");
                    return Ok(WorkerExit::InputClosed);
                };
                let (command, data) = match request {
                    WorkerRequest::Command { command, data } => (command, data),
                    WorkerRequest::Init { .. } => {
                        let reply = WorkerReply::error("worker_protocol", "worker is already initialised");
                        write_message(&mut writer, &reply, MAX_REPLY_SIZE).await?;
                        continue;
                    }
                };

                debug!(registry = %registry, command = %command, "Received command");
                match dispatcher.command(&command, data).await {
                    Ok(DispatchOutcome::Response(response)) => {
                        write_message(&mut writer, &WorkerReply::Ok { response }, MAX_REPLY_SIZE).await?;
                    }
                    Ok(DispatchOutcome::Terminate(response)) => {
                        write_message(&mut writer, &WorkerReply::Terminated { response }, MAX_REPLY_SIZE)
                            .await?;
                        info!(registry = %registry, "Session terminated, stopping worker");
                        return Ok(WorkerExit::Terminated);
                    }
                    Err(e) => {
                        write_message(&mut writer, &error_reply(&e), MAX_REPLY_SIZE).await?;
                        if e.is_fatal() {
                            error!(registry = %registry, error = %e, "Registry connection lost, stopping worker");
                            return Err(e.into());
                        }
                    }
                }
            }
        }
    }
}
