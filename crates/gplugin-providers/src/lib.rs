//! Google credential lifecycle and API clients for the gplugin gateway.
//!
//! - [`google::CredentialManager`] - produces a valid OAuth credential,
//!   refreshing or re-authorizing as needed
//! - [`google::CalendarApi`], [`google::GmailApi`], [`google::PeopleApi`] -
//!   thin clients bound to one access token
//! - [`ProviderError`] - error type shared by all of the above
//!
//! # Example
//!
//! ```ignore
//! use gplugin_providers::google::{CredentialManager, GoogleConfig};
//!
//! let manager = CredentialManager::new(GoogleConfig::default())?;
//! let calendar = manager.get_calendar_client().await?;
//! let events = calendar.list_upcoming(10).await?;
//! ```

pub mod error;
pub mod google;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
