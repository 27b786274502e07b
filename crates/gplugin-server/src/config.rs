//! Gateway configuration.
//!
//! All settings live in a single `config.toml`, by default at
//! `~/.config/gplugin/config.toml`. Every key is optional.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [google]
//! token_path = "/var/lib/gplugin/token.json"
//! interactive = false
//! scopes = ["https://www.googleapis.com/auth/calendar"]
//!
//! [google.endpoints]
//! calendar = "https://www.googleapis.com/calendar/v3"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gplugin_providers::google::{GoogleConfig, GoogleEndpoints};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides `[server] port`.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the gplugin gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    pub google: GoogleSettings,
}

/// Listening address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// `[google]` section. Unset values fall back to [`GoogleConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub token_path: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    /// Name of the variable holding the base64 token blob.
    pub token_env: Option<String>,
    /// Name of the variable holding the client secret JSON.
    pub credentials_env: Option<String>,
    pub scopes: Option<Vec<String>>,
    /// Allow the browser flow. Disable for hosted deploys.
    pub interactive: Option<bool>,
    pub loopback_port_range: Option<[u16; 2]>,
    pub timeout_secs: Option<u64>,
    pub time_zone: Option<String>,
    pub calendar_id: Option<String>,
    pub endpoints: EndpointSettings,
}

/// `[google.endpoints]` base URL overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub auth: Option<String>,
    pub token: Option<String>,
    pub calendar: Option<String>,
    pub gmail: Option<String>,
    pub people: Option<String>,
}

impl EndpointSettings {
    fn apply(&self, mut endpoints: GoogleEndpoints) -> GoogleEndpoints {
        let overrides = [
            (&self.auth, &mut endpoints.auth),
            (&self.token, &mut endpoints.token),
            (&self.calendar, &mut endpoints.calendar),
            (&self.gmail, &mut endpoints.gmail),
            (&self.people, &mut endpoints.people),
        ];
        for (value, slot) in overrides {
            if let Some(url) = value {
                *slot = url.trim_end_matches('/').to_string();
            }
        }
        endpoints
    }
}

impl GoogleSettings {
    /// Converts to provider configuration.
    pub fn to_provider_config(&self) -> Result<GoogleConfig, ConfigError> {
        let defaults = GoogleConfig::default();

        let config = GoogleConfig {
            token_path: self.token_path.clone().unwrap_or(defaults.token_path),
            credentials_path: self
                .credentials_path
                .clone()
                .unwrap_or(defaults.credentials_path),
            token_env: self.token_env.clone().unwrap_or(defaults.token_env),
            credentials_env: self
                .credentials_env
                .clone()
                .unwrap_or(defaults.credentials_env),
            scopes: self.scopes.clone().unwrap_or(defaults.scopes),
            interactive: self.interactive.unwrap_or(defaults.interactive),
            loopback_port_range: self
                .loopback_port_range
                .map(|[start, end]| (start, end))
                .unwrap_or(defaults.loopback_port_range),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            time_zone: self.time_zone.clone().unwrap_or(defaults.time_zone),
            calendar_id: self.calendar_id.clone().unwrap_or(defaults.calendar_id),
            endpoints: self.endpoints.apply(defaults.endpoints),
        };

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl GatewayConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gplugin")
            .join("config.toml")
    }

    /// Applies a `PORT` value, as set by hosting platforms.
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a port: {:?}", PORT_ENV, port)))?;
        }
        Ok(self)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ConfigError::Invalid(format!(
                    "bad listen address {}:{}: {}",
                    self.server.host, self.server.port, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:8000");

        let google = config.google.to_provider_config().unwrap();
        assert!(google.interactive);
        assert_eq!(google.loopback_port_range, (8080, 8090));
        assert_eq!(google.endpoints, GoogleEndpoints::default());
    }

    #[test]
    fn google_section_overrides() {
        let config: GatewayConfig = toml::from_str(
            r#"
[server]
port = 9000

[google]
token_path = "/srv/token.json"
interactive = false
loopback_port_range = [0, 0]
timeout_secs = 5
time_zone = "Europe/Paris"

[google.endpoints]
gmail = "http://127.0.0.1:9999/gmail/v1/"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        let google = config.google.to_provider_config().unwrap();
        assert_eq!(google.token_path, PathBuf::from("/srv/token.json"));
        assert!(!google.interactive);
        assert_eq!(google.loopback_port_range, (0, 0));
        assert_eq!(google.timeout, Duration::from_secs(5));
        assert_eq!(google.time_zone, "Europe/Paris");
        assert_eq!(google.endpoints.gmail, "http://127.0.0.1:9999/gmail/v1");
        assert_eq!(
            google.endpoints.calendar,
            GoogleEndpoints::default().calendar
        );
    }

    #[test]
    fn empty_scopes_are_rejected() {
        let settings = GoogleSettings {
            scopes: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            settings.to_provider_config(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn port_override() {
        let config = GatewayConfig::default()
            .with_port_override(Some("10000"))
            .unwrap();
        assert_eq!(config.server.port, 10000);

        let unchanged = GatewayConfig::default().with_port_override(None).unwrap();
        assert_eq!(unchanged.server.port, 8000);

        assert!(GatewayConfig::default().with_port_override(Some("http")).is_err());
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = GatewayConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = GatewayConfig::default();
        config.google.interactive = Some(false);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: GatewayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
