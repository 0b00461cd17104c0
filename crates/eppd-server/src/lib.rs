//! Registry sessions, worker pool and supervisor daemon.
//!
//! This crate provides:
//! - the TLS transport and per-registry EPP session state machine
//! - the dispatcher that guards commands behind a logged-in session
//! - the worker runtime (`eppd worker`) and its keepalive loop
//! - the worker pool and the supervisor (`eppd serve`) with its Unix socket
//!
//! # Example
//!
//! ```rust,no_run
//! use eppd_core::EppdConfig;
//! use eppd_server::{Supervisor, WorkerCommand};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EppdConfig::load()?;
//!     Supervisor::new(config, WorkerCommand::current_exe()?).run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod dispatcher;
mod error;
mod handler;
mod pidfile;
mod pool;
mod session;
mod signals;
mod socket;
mod supervisor;
mod transport;
mod worker;

pub use config::{ServerConfig, default_socket_path};
pub use dispatcher::{DispatchOutcome, Dispatcher, transaction_id};
pub use error::{
    ServerError, ServerResult, SessionError, SessionResult, TransportError, TransportResult,
};
pub use handler::{RequestHandler, make_connection_handler};
pub use pidfile::{PidFile, default_pid_path};
pub use pool::{PoolCall, PoolHandle, WorkerChannel, WorkerPool, spawn_pool};
pub use session::{CommandOutcome, Session, SessionState};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
pub use supervisor::{Supervisor, WorkerCommand, WorkerProcess};
pub use transport::{BoxFuture, Connected, FramedStream, TlsTransport, Transport, client_config};
pub use worker::{WorkerExit, run_worker};
