//! Google OAuth and REST clients.

pub mod calendar;
pub mod client;
pub mod config;
pub mod credentials;
pub mod gmail;
pub mod mime;
pub mod oauth;
pub mod people;
pub mod tokens;

pub use calendar::CalendarApi;
pub use client::GoogleClient;
pub use config::{GoogleConfig, GoogleEndpoints, OAuthCredentials};
pub use credentials::{CredentialManager, CredentialStatus, EnvSource, MapEnv, ProcessEnv};
pub use gmail::GmailApi;
pub use oauth::{OAuthClient, PkceParams, RefreshedToken};
pub use people::PeopleApi;
pub use tokens::{TokenInfo, TokenStorage};
