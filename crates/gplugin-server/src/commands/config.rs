//! Configuration commands.

use std::path::Path;

use super::CommandResult;
use crate::config::GatewayConfig;

/// Dumps the effective configuration as TOML.
pub fn dump(config: &GatewayConfig, path: &Path) -> CommandResult<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Shows the configuration file path.
pub fn path(path: &Path) -> CommandResult<()> {
    let state = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("config: {}{}", path.display(), state);
    Ok(())
}
