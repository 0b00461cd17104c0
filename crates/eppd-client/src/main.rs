//! eppd entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use eppd_core::EppdConfig;
use eppd_core::tracing::{LogFormat, TracingConfig, init_tracing};

use eppd_client::SocketClient;
use eppd_client::cli::{Cli, Command, ConfigAction};
use eppd_client::commands;
use eppd_client::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(EppdConfig::default_path);
    let config = if config_path.exists() || cli.config.is_some() {
        EppdConfig::load_from(&config_path)
    } else {
        Ok(EppdConfig::default())
    };

    let mut tracing = match cli.command {
        Command::Serve => TracingConfig::supervisor(),
        Command::Worker => TracingConfig::worker(),
        _ => TracingConfig::cli(),
    }
    .verbose(cli.verbose);
    if cli.command.is_daemon()
        && let Ok(config) = &config
        && config.daemon.json_logs
    {
        tracing = tracing.with_format(LogFormat::Json);
    }
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: failed to initialise logging: {}", e);
    }

    let result = match config {
        Ok(config) => run(cli, config, &config_path).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: EppdConfig, config_path: &std::path::Path) -> ClientResult<()> {
    let client = || {
        let socket = cli
            .socket_path
            .clone()
            .or_else(|| config.daemon.socket_path.clone())
            .unwrap_or_else(eppd_server::default_socket_path);
        SocketClient::new(socket, Duration::from_secs(cli.timeout))
    };

    match &cli.command {
        Command::Serve => {
            commands::serve::run(
                config.clone(),
                config_path,
                cli.socket_path.as_deref(),
                cli.verbose,
            )
            .await
        }
        Command::Worker => commands::worker::run(&config).await,
        Command::Send {
            registry,
            command,
            data,
        } => {
            let data = commands::send::parse_data(data.as_deref())?;
            commands::send::command(&client(), registry, command, data).await
        }
        Command::Registries => commands::send::registries(&client()).await,
        Command::Ping => commands::send::ping(&client()).await,
        Command::Stop => commands::send::stop(&client()).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(config_path),
        },
    }
}
