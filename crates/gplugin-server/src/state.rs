//! Shared handler state.

use std::sync::Arc;

use gplugin_providers::google::CredentialManager;

/// State handed to every handler through axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialManager>,
}

impl AppState {
    pub fn new(credentials: CredentialManager) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }
}
