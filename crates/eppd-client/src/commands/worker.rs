//! Worker command: one registry session driven over stdin/stdout.

use tracing::info;

use eppd_core::EppdConfig;
use eppd_server::{Dispatcher, run_worker};

use crate::error::ClientResult;

/// Runs the worker loop until the session terminates or stdin closes.
///
/// Stdout carries IPC frames only; logs go to stderr.
pub async fn run(config: &EppdConfig) -> ClientResult<()> {
    let exit = run_worker(tokio::io::stdin(), tokio::io::stdout(), |registry| {
        Dispatcher::from_config(registry, config)
    })
    .await?;
    info!(?exit, "Worker stopped");
    Ok(())
}
