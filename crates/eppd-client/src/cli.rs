//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// eppd - EPP registry client daemon
#[derive(Debug, Parser)]
#[command(name = "eppd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "EPPD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Path to the supervisor socket
    #[arg(long, env = "EPPD_SOCKET", global = true)]
    pub socket_path: Option<PathBuf>,

    /// Front-end request timeout in seconds
    #[arg(long, default_value = "60", global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the supervisor in the foreground
    Serve,

    /// Run a registry worker on stdin/stdout (spawned by `serve`)
    #[command(hide = true)]
    Worker,

    /// Send an EPP command through the running supervisor
    Send {
        /// Registry name, as configured under `[registries]`
        registry: String,

        /// Command name, e.g. `checkDomain` or `infoContact`
        command: String,

        /// JSON payload; `-` reads it from stdin
        data: Option<String>,
    },

    /// List the registries served by the running supervisor
    Registries,

    /// Check that the supervisor is answering
    Ping,

    /// Log every session out and stop the supervisor
    Stop,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Command {
    /// Whether this command runs a long-lived process.
    pub fn is_daemon(&self) -> bool {
        matches!(self, Self::Serve | Self::Worker)
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration and resolve credentials
    Validate,

    /// Show configuration file path
    Path,
}
