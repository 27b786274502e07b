//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// gplugin - Google Calendar, Gmail and Contacts over HTTP
#[derive(Debug, Parser)]
#[command(name = "gplugin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "GPLUGIN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log format: pretty, compact or json
    #[arg(long, env = "GPLUGIN_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (the default)
    Serve {
        /// Address to bind, overriding the config file
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overriding the config file and $PORT
        #[arg(long)]
        port: Option<u16>,
    },

    /// Authorize access to the Google account in the browser
    Auth {
        /// Re-authorize even if a valid token is stored
        #[arg(long, short)]
        force: bool,

        /// Remove the stored token instead
        #[arg(long, conflicts_with = "force")]
        logout: bool,
    },

    /// Show the stored credential
    Status,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Show configuration file path
    Path,
}
