//! gplugin entry point.

use std::process::ExitCode;

use clap::Parser;
use gplugin_core::{LogFormat, TracingConfig, init_tracing};

use gplugin_server::cli::{Cli, Command, ConfigAction};
use gplugin_server::commands::{self, CommandResult};
use gplugin_server::config::{GatewayConfig, PORT_ENV};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut tracing_config = if cli.debug {
        TracingConfig::debug()
    } else {
        TracingConfig::default()
    };
    if let Some(ref name) = cli.log_format {
        match name.parse::<LogFormat>() {
            Ok(format) => tracing_config = tracing_config.with_format(format),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CommandResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(GatewayConfig::default_path);
    let config = match cli.config {
        Some(ref path) => GatewayConfig::load_from(path)?,
        None => GatewayConfig::load()?,
    };
    let port = std::env::var(PORT_ENV).ok().filter(|p| !p.is_empty());
    let mut config = config.with_port_override(port.as_deref())?;

    match cli.command {
        None => commands::serve::run(&config).await,
        Some(Command::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::serve::run(&config).await
        }
        Some(Command::Auth { force, logout }) => {
            commands::auth::login(&config, force, logout).await
        }
        Some(Command::Status) => commands::auth::status(&config),
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
