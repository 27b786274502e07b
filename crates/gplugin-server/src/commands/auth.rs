//! `gplugin auth` and `gplugin status`.

use gplugin_providers::google::CredentialManager;

use super::CommandResult;
use crate::config::GatewayConfig;

/// Runs the browser flow, or removes the stored token with `logout`.
pub async fn login(config: &GatewayConfig, force: bool, logout: bool) -> CommandResult<()> {
    let manager = CredentialManager::new(config.google.to_provider_config()?)?;
    let token_path = manager.config().token_path.display().to_string();

    if logout {
        if manager.logout()? {
            println!("Removed stored token {}.", token_path);
        } else {
            println!("No stored token at {}.", token_path);
        }
        return Ok(());
    }

    let status = manager.status()?;
    if (status.valid || status.has_refresh_token) && !force {
        println!("Already authorized with Google ({}).", token_path);
        println!("Use --force to re-authorize.");
        return Ok(());
    }

    println!("Starting Google authorization...");
    println!();
    println!("A browser window will open for you to grant access.");
    println!("If it doesn't, open the URL printed in the log.");
    println!();

    manager.authenticate().await?;

    println!("Authorized. Token saved to {}.", token_path);
    Ok(())
}

/// Prints the stored credential without contacting Google.
pub fn status(config: &GatewayConfig) -> CommandResult<()> {
    let manager = CredentialManager::new(config.google.to_provider_config()?)?;
    println!("{}", manager.status()?);
    Ok(())
}
