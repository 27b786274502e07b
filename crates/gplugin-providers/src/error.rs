//! Failures below the HTTP gateway.
//!
//! Credential handling, the token endpoint and the Calendar/Gmail/People
//! calls all report a [`ProviderError`]. Its [`ProviderErrorCode`] tells
//! the gateway whether the credential lifecycle itself failed
//! ([`ProviderError::is_auth`]) or an upstream call did.

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

macro_rules! error_codes {
    ($($(#[$doc:meta])* $code:ident => $name:literal, $ctor:ident;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ProviderErrorCode {
            $($(#[$doc])* $code,)+
        }

        impl ProviderErrorCode {
            /// Stable snake_case name, as shown in error messages.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$code => $name,)+
                }
            }
        }

        impl ProviderError {
            $(
                pub fn $ctor(message: impl Into<String>) -> Self {
                    Self::new(ProviderErrorCode::$code, message)
                }
            )+
        }
    };
}

error_codes! {
    /// Missing or revoked credential, or a failed consent flow.
    AuthenticationFailed => "authentication_failed", authentication;
    /// 403 from Google.
    AuthorizationFailed => "authorization_failed", authorization;
    NetworkError => "network_error", network;
    RateLimited => "rate_limited", rate_limited;
    ServerError => "server_error", server;
    /// Body was not the JSON shape expected.
    InvalidResponse => "invalid_response", invalid_response;
    /// 404 or 410.
    NotFound => "not_found", not_found;
    BadRequest => "bad_request", bad_request;
    /// Unusable local setup: client secret, token file, environment.
    ConfigurationError => "configuration_error", configuration;
    InternalError => "internal_error", internal;
}

impl ProviderErrorCode {
    /// Code for a non-success status returned by a Google API.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 | 410 => Self::NotFound,
            400 => Self::BadRequest,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::InvalidResponse,
        }
    }

    /// The credential lifecycle failed, as opposed to an upstream call.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::ConfigurationError)
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{}{code}: {message}", .service.map(|s| format!("[{}] ", s)).unwrap_or_default())]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Which upstream produced it: "calendar", "gmail", "people", "oauth".
    service: Option<&'static str>,
    #[source]
    source: Option<BoxError>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            service: None,
            source: None,
        }
    }

    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::from_status(status), message)
    }

    /// Transport failure before any status was received.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("could not connect: {}", err)
        } else {
            format!("request failed: {}", err)
        };
        Self::network(message).with_source(err)
    }

    #[must_use]
    pub fn with_provider(self, service: &'static str) -> Self {
        Self {
            service: Some(service),
            ..self
        }
    }

    #[must_use]
    pub fn with_source(self, source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..self
        }
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&'static str> {
        self.service
    }

    pub fn is_auth(&self) -> bool {
        self.code.is_auth()
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
