//! HTTP gateway exposing Google Calendar, Gmail and Contacts to a plugin
//! host.
//!
//! - [`routes::router`] - the axum router, built from an [`AppState`]
//! - [`config::GatewayConfig`] - `config.toml` loading
//! - [`error::ApiError`] - the `{"detail": ...}` error envelope

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod request_tracing;
pub mod routes;
pub mod signals;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
