//! Serve command: starts the supervisor in the foreground.

use std::path::Path;

use tracing::info;

use eppd_core::EppdConfig;
use eppd_server::{Supervisor, WorkerCommand};

use crate::error::{ClientError, ClientResult};

/// Validates the configuration and runs the supervisor until shutdown.
///
/// Workers are started from the current executable with the same
/// configuration file and verbosity.
pub async fn run(mut config: EppdConfig, config_path: &Path, socket: Option<&Path>, verbose: bool) -> ClientResult<()> {
    config.validate()?;
    if config.registries.is_empty() {
        return Err(ClientError::Config(format!(
            "no registries configured in {}",
            config_path.display()
        )));
    }
    if let Some(socket) = socket {
        config.daemon.socket_path = Some(socket.to_path_buf());
    }

    let mut worker = WorkerCommand::current_exe()?
        .arg("--config")
        .arg(config_path);
    if verbose {
        worker = worker.arg("--verbose");
    }

    info!(registries = config.registries.len(), "Starting supervisor");
    Supervisor::new(config, worker).run().await?;
    Ok(())
}
