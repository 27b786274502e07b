//! Subcommand implementations.

pub mod auth;
pub mod config;
pub mod serve;

use gplugin_providers::ProviderError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for CLI commands.
pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
