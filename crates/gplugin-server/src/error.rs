//! Gateway error types and their HTTP envelope.
//!
//! Every failure leaves a handler as `{"detail": <message>}`. Credential and
//! provider failures are 500; malformed requests are 422.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gplugin_providers::ProviderError;
use serde_json::json;
use thiserror::Error;

/// Result type for request handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable credential could be produced.
    #[error("{0}")]
    Auth(ProviderError),

    /// The Google call failed.
    #[error("{0}")]
    Provider(ProviderError),

    /// The request body or query did not match the expected shape.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) | Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Text placed in `detail`.
    pub fn detail(&self) -> String {
        match self {
            Self::Auth(e) | Self::Provider(e) => e.message().to_string(),
            Self::Validation(msg) => msg.clone(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        if err.is_auth() {
            Self::Auth(err)
        } else {
            Self::Provider(err)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Auth(e) => tracing::error!("authentication error: {}", e),
            Self::Provider(e) => tracing::error!("provider error: {}", e),
            Self::Validation(msg) => tracing::warn!("rejected request: {}", msg),
        }
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}
