//! Settings for the credential lifecycle and the Google clients.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

const APP_DIR: &str = "gplugin";

/// OAuth client identity from the client secret configuration.
///
/// Needed for the consent flow, and for refreshing a token file that does
/// not name its own client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Layouts accepted for the client secret file: the Cloud Console download
/// (client under `installed` or `web`) or a flat object such as an
/// authorized-user token.
#[derive(Deserialize)]
#[serde(untagged)]
enum ClientSecretFile {
    Installed { installed: OAuthCredentials },
    Web { web: OAuthCredentials },
    Flat(OAuthCredentials),
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "cannot read client secret file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("client secret is not valid JSON: {}", e))
        })?;
        match serde_json::from_value(value) {
            Ok(ClientSecretFile::Installed { installed }) => Ok(installed),
            Ok(ClientSecretFile::Web { web }) => Ok(web),
            Ok(ClientSecretFile::Flat(credentials)) => Ok(credentials),
            Err(_) => Err(ProviderError::configuration(
                "client secret needs an \"installed\" or \"web\" section, \
                 or client_id and client_secret at the top level",
            )),
        }
    }

    /// Sanity check; a failure here is worth a warning, not an abort.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            Err("client_id is empty")
        } else if self.client_secret.is_empty() {
            Err("client_secret is empty")
        } else if !self.client_id.ends_with(".apps.googleusercontent.com") {
            Err("client_id does not end with .apps.googleusercontent.com")
        } else {
            Ok(())
        }
    }
}

/// Base URLs of the Google services in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub auth: String,
    pub token: String,
    pub calendar: String,
    pub gmail: String,
    pub people: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            calendar: "https://www.googleapis.com/calendar/v3".to_string(),
            gmail: "https://gmail.googleapis.com/gmail/v1".to_string(),
            people: "https://people.googleapis.com/v1".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// Every service under one host, with Google's path layout.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let at = |path: &str| format!("{}{}", base, path);
        Self {
            auth: at("/o/oauth2/v2/auth"),
            token: at("/token"),
            calendar: at("/calendar/v3"),
            gmail: at("/gmail/v1"),
            people: at("/v1"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Where the authorized-user token is persisted.
    pub token_path: PathBuf,
    /// Client secret configuration file.
    pub credentials_path: PathBuf,
    /// Variable with a base64 token blob; replaces the stored token.
    pub token_env: String,
    /// Variable with client secret JSON; written to `credentials_path`.
    pub credentials_env: String,
    pub scopes: Vec<String>,
    /// When false a missing credential fails instead of opening a browser.
    pub interactive: bool,
    /// Inclusive loopback port range for the consent redirect; 0 asks the OS.
    pub loopback_port_range: (u16, u16),
    /// Per-request timeout for Google calls.
    pub timeout: Duration,
    /// Zone attached to `dateTime` values of created and edited events.
    pub time_zone: String,
    pub calendar_id: String,
    pub endpoints: GoogleEndpoints,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            token_path: Self::default_token_path(),
            credentials_path: Self::default_credentials_path(),
            token_env: Self::DEFAULT_TOKEN_ENV.to_string(),
            credentials_env: Self::DEFAULT_CREDENTIALS_ENV.to_string(),
            scopes: Self::DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            interactive: true,
            loopback_port_range: (8080, 8090),
            timeout: Duration::from_secs(30),
            time_zone: "UTC".to_string(),
            calendar_id: "primary".to_string(),
            endpoints: GoogleEndpoints::default(),
        }
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

impl GoogleConfig {
    pub const DEFAULT_TOKEN_ENV: &'static str = "GOOGLE_TOKEN_BASE64";

    pub const DEFAULT_CREDENTIALS_ENV: &'static str = "GOOGLE_CREDENTIALS_JSON";

    pub const DEFAULT_SCOPES: &'static [&'static str] = &[
        "https://www.googleapis.com/auth/calendar",
        "https://www.googleapis.com/auth/gmail.send",
        "https://www.googleapis.com/auth/gmail.compose",
        "https://www.googleapis.com/auth/gmail.readonly",
        "https://www.googleapis.com/auth/gmail.modify",
        "https://www.googleapis.com/auth/contacts.readonly",
    ];

    /// `token.json` under the platform data directory.
    pub fn default_token_path() -> PathBuf {
        app_dir(dirs::data_dir()).join("token.json")
    }

    /// `credentials.json` under the platform config directory.
    pub fn default_credentials_path() -> PathBuf {
        app_dir(dirs::config_dir()).join("credentials.json")
    }

    pub fn with_token_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: path.into(),
            ..self
        }
    }

    pub fn with_credentials_path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: path.into(),
            ..self
        }
    }

    pub fn with_interactive(self, interactive: bool) -> Self {
        Self {
            interactive,
            ..self
        }
    }

    pub fn with_scopes(self, scopes: Vec<String>) -> Self {
        Self { scopes, ..self }
    }

    pub fn with_endpoints(self, endpoints: GoogleEndpoints) -> Self {
        Self { endpoints, ..self }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_loopback_port_range(self, first: u16, last: u16) -> Self {
        Self {
            loopback_port_range: (first, last),
            ..self
        }
    }

    pub fn with_env_names(
        self,
        token_env: impl Into<String>,
        credentials_env: impl Into<String>,
    ) -> Self {
        Self {
            token_env: token_env.into(),
            credentials_env: credentials_env.into(),
            ..self
        }
    }

    /// Rejects settings the credential manager cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        let (first, last) = self.loopback_port_range;
        let problem = if self.scopes.is_empty() {
            "no OAuth scopes configured".to_string()
        } else if first > last {
            format!("loopback port range {}-{} is reversed", first, last)
        } else if self.token_env.is_empty() || self.credentials_env.is_empty() {
            "environment variable names must not be empty".to_string()
        } else if self.time_zone.trim().is_empty() {
            "time_zone must not be empty".to_string()
        } else if self.calendar_id.trim().is_empty() {
            "calendar_id must not be empty".to_string()
        } else {
            return Ok(());
        };
        Err(problem)
    }
}
