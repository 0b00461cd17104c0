//! Supervisor daemon (`eppd serve`).
//!
//! Spawns one `eppd worker` child per configured registry, registers each in
//! the worker pool and serves front-end requests on the Unix socket. On
//! shutdown every worker is sent `logout {kill: true}` before the supervisor
//! exits.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use eppd_core::EppdConfig;
use eppd_protocol::{
    MAX_MESSAGE_SIZE, MAX_REPLY_SIZE, WorkerReply, WorkerRequest, read_message, write_message,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{RequestHandler, make_connection_handler};
use crate::pidfile::{PidFile, default_pid_path};
use crate::pool::{PoolHandle, WorkerChannel, spawn_pool};
use crate::signals::SignalHandler;
use crate::socket::SocketServer;
use crate::transport::BoxFuture;

/// How long a worker gets to answer the final logout.
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a worker gets to exit once its channel is closed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

type Job = (WorkerRequest, oneshot::Sender<ServerResult<WorkerReply>>);

/// Program and leading arguments used to start a worker.
///
/// `worker` is appended as the final argument.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// The running executable, so workers match the supervisor's build.
    pub fn current_exe() -> ServerResult<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Channel to one worker's stdin/stdout.
///
/// Requests are relayed one at a time by a dedicated task; the pool already
/// guarantees a single caller per worker.
#[derive(Debug, Clone)]
pub struct WorkerProcess {
    registry: String,
    tx: mpsc::Sender<Job>,
}

impl WorkerProcess {
    /// Starts a worker child and sends it the registry name.
    ///
    /// The returned task ends when the worker terminates, dies, or every
    /// clone of the handle is dropped; the child is reaped (or killed) then.
    pub async fn spawn(command: &WorkerCommand, registry: &str) -> ServerResult<(Self, JoinHandle<()>)> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .arg("worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ServerError::worker_protocol("worker stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServerError::worker_protocol("worker stdout is not piped"))?;
        info!(registry, pid = child.id(), "Spawned worker");

        let (worker, relay) = Self::attach(registry, stdin, stdout).await?;
        let name = registry.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = relay.await {
                warn!(registry = %name, error = %e, "Worker relay task failed");
            }
            match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) if status.success() => info!(registry = %name, %status, "Worker exited"),
                Ok(Ok(status)) => warn!(registry = %name, %status, "Worker exited with failure"),
                Ok(Err(e)) => error!(registry = %name, error = %e, "Failed to wait for worker"),
                Err(_) => {
                    warn!(registry = %name, "Worker did not exit, killing it");
                    if let Err(e) = child.kill().await {
                        error!(registry = %name, error = %e, "Failed to kill worker");
                    }
                }
            }
        });
        Ok((worker, task))
    }

    /// Sends the registry name over `writer` and starts relaying requests.
    pub async fn attach<W, R>(
        registry: &str,
        mut writer: W,
        reader: R,
    ) -> ServerResult<(Self, JoinHandle<()>)>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        write_message(&mut writer, &WorkerRequest::init(registry), MAX_MESSAGE_SIZE).await?;

        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(relay(registry.to_string(), writer, reader, rx));
        Ok((
            Self {
                registry: registry.to_string(),
                tx,
            },
            task,
        ))
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }
}

impl WorkerChannel for WorkerProcess {
    fn call(&self, request: WorkerRequest) -> BoxFuture<'static, ServerResult<WorkerReply>> {
        let tx = self.tx.clone();
        let registry = self.registry.clone();
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            if tx.send((request, reply_tx)).await.is_err() {
                return Err(ServerError::worker_unavailable(registry));
            }
            reply_rx
                .await
                .map_err(|_| ServerError::worker_unavailable(registry))?
        })
    }
}

async fn relay<W, R>(registry: String, mut writer: W, mut reader: R, mut jobs: mpsc::Receiver<Job>)
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    while let Some((request, reply_tx)) = jobs.recv().await {
        let reply = exchange(&registry, &mut writer, &mut reader, &request).await;
        let done = match &reply {
            Ok(reply) => reply.is_terminated(),
            Err(e) => {
                warn!(registry = %registry, error = %e, "Lost contact with worker");
                true
            }
        };
        let _ = reply_tx.send(reply);
        if done {
            break;
        }
    }
    debug!(registry = %registry, "Worker relay stopped");
}

async fn exchange<W, R>(
    registry: &str,
    writer: &mut W,
    reader: &mut R,
    request: &WorkerRequest,
) -> ServerResult<WorkerReply>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    write_message(writer, request, MAX_MESSAGE_SIZE).await?;
    read_message(reader, MAX_REPLY_SIZE)
        .await?
        .ok_or_else(|| ServerError::worker_unavailable(registry))
}

/// The `eppd serve` process.
pub struct Supervisor {
    config: EppdConfig,
    server_config: ServerConfig,
    worker_command: WorkerCommand,
    pid_path: PathBuf,
}

impl Supervisor {
    pub fn new(config: EppdConfig, worker_command: WorkerCommand) -> Self {
        let server_config = ServerConfig::from_settings(&config.daemon);
        let pid_path = config
            .daemon
            .pid_path
            .clone()
            .unwrap_or_else(default_pid_path);
        Self {
            config,
            server_config,
            worker_command,
            pid_path,
        }
    }

    pub fn with_server_config(mut self, server_config: ServerConfig) -> Self {
        self.server_config = server_config;
        self
    }

    pub fn with_pid_path(mut self, pid_path: impl Into<PathBuf>) -> Self {
        self.pid_path = pid_path.into();
        self
    }

    /// Runs until SIGINT, SIGTERM or a front-end `shutdown` request.
    pub async fn run(self) -> ServerResult<()> {
        let _pid_file = PidFile::create(&self.pid_path)?;
        let signals = SignalHandler::new();
        signals.spawn_listener()?;

        let server = SocketServer::new(self.server_config.clone()).await?;
        let pool = spawn_pool::<WorkerProcess>();

        let mut workers = Vec::new();
        for registry in self.config.registries.keys() {
            match WorkerProcess::spawn(&self.worker_command, registry).await {
                Ok((worker, task)) => {
                    pool.register(worker.registry().to_string(), worker).await?;
                    workers.push((registry.clone(), task));
                }
                Err(e) => error!(registry = %registry, error = %e, "Failed to spawn worker"),
            }
        }
        if workers.is_empty() {
            warn!("No registry workers running");
        }

        let registries: Vec<String> = workers.iter().map(|(name, _)| name.clone()).collect();
        info!(
            socket = %server.socket_path().display(),
            registries = ?registries,
            "Supervisor ready"
        );

        let handler = RequestHandler::new(pool.clone(), registries, signals.shutdown_handle());
        server
            .run_until_shutdown(make_connection_handler(handler), signals.shutdown().wait())
            .await?;
        drop(server);

        stop_workers(&pool, workers).await;
        info!("Supervisor stopped");
        Ok(())
    }
}

/// Logs every worker out with `kill` and waits for the processes to exit.
async fn stop_workers(pool: &PoolHandle<WorkerProcess>, workers: Vec<(String, JoinHandle<()>)>) {
    for (registry, _) in &workers {
        let logout = WorkerRequest::command("logout", json!({"kill": true}));
        match tokio::time::timeout(LOGOUT_TIMEOUT, pool.dispatch(registry, logout)).await {
            Ok(Ok(reply)) => info!(registry = %registry, ?reply, "Exit reply"),
            Ok(Err(e)) => warn!(registry = %registry, error = %e, "Logout failed"),
            Err(_) => warn!(registry = %registry, "Logout timed out"),
        }
    }
    for (registry, task) in workers {
        if tokio::time::timeout(LOGOUT_TIMEOUT, task).await.is_err() {
            warn!(registry = %registry, "Worker task did not finish");
        }
    }
}
