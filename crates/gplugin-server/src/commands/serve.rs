//! `gplugin serve`: run the HTTP gateway until SIGINT/SIGTERM.

use gplugin_providers::google::CredentialManager;
use tokio::net::TcpListener;
use tracing::info;

use super::CommandResult;
use crate::config::GatewayConfig;
use crate::routes::router;
use crate::signals::Shutdown;
use crate::state::AppState;

pub async fn run(config: &GatewayConfig) -> CommandResult<()> {
    let google = config.google.to_provider_config()?;
    info!(
        token_path = %google.token_path.display(),
        interactive = google.interactive,
        "credential store"
    );
    let manager = CredentialManager::new(google)?;

    let listener = TcpListener::bind(config.listen_addr()?).await?;
    info!("listening on http://{}", listener.local_addr()?);

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    axum::serve(listener, router(AppState::new(manager)))
        .with_graceful_shutdown(shutdown.wait())
        .await?;

    info!("server stopped");
    Ok(())
}
