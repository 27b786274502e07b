//! Credential lifecycle: environment overrides, load, refresh, authorize.
//!
//! [`CredentialManager::get_credentials`] is the single entry point every
//! API call goes through. Per call it:
//!
//! 1. overwrites the token store with the environment token blob, if set
//! 2. writes the environment client-secret JSON to its file, if set
//! 3. loads the token store (a corrupt file counts as absent)
//! 4. if there is no valid credential, refreshes an expired one holding a
//!    refresh token, or else runs the interactive PKCE flow
//! 5. persists the credential whenever step 4 ran
//!
//! Step 4 is serialized; waiters reload the store once they get the lock
//! and reuse whatever the previous holder produced.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::calendar::CalendarApi;
use super::client::{GoogleClient, build_http_client};
use super::config::{GoogleConfig, OAuthCredentials};
use super::gmail::GmailApi;
use super::oauth::OAuthClient;
use super::people::PeopleApi;
use super::tokens::{TokenInfo, TokenStorage, write_private_file};

/// Source of environment overrides.
pub trait EnvSource: Send + Sync + fmt::Debug {
    /// Returns the variable's value; empty values count as unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Snapshot of the stored credential, for `gplugin status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub token_path: PathBuf,
    pub token_present: bool,
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
    pub scopes: Vec<String>,
    pub credentials_path: PathBuf,
    pub credentials_present: bool,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "token file:      {}", self.token_path.display())?;
        if !self.token_present {
            writeln!(f, "token:           none")?;
        } else {
            let state = if self.valid { "valid" } else { "expired" };
            writeln!(f, "token:           {}", state)?;
            match self.expires_at {
                Some(at) => writeln!(f, "expires:         {}", at.to_rfc3339())?,
                None => writeln!(f, "expires:         never")?,
            }
            writeln!(f, "refresh token:   {}", if self.has_refresh_token { "yes" } else { "no" })?;
            writeln!(f, "scopes:          {}", self.scopes.len())?;
        }
        write!(
            f,
            "client secret:   {} ({})",
            self.credentials_path.display(),
            if self.credentials_present { "present" } else { "missing" }
        )
    }
}

/// Produces valid Google credentials and the service clients bound to them.
#[derive(Debug)]
pub struct CredentialManager {
    config: GoogleConfig,
    storage: TokenStorage,
    http: reqwest::Client,
    oauth: OAuthClient,
    env: Box<dyn EnvSource>,
    renew_lock: Mutex<()>,
}

impl CredentialManager {
    /// Creates a manager reading overrides from the process environment.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let http = build_http_client(config.timeout)?;
        let oauth = OAuthClient::new(
            http.clone(),
            config.endpoints.auth.clone(),
            config.endpoints.token.clone(),
        );

        Ok(Self {
            storage: TokenStorage::new(config.token_path.clone()),
            config,
            http,
            oauth,
            env: Box::new(ProcessEnv),
            renew_lock: Mutex::new(()),
        })
    }

    /// Replaces the environment the overrides are read from.
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Returns a currently valid credential.
    ///
    /// # Errors
    ///
    /// Authentication errors when no credential can be produced (headless,
    /// no client secret, flow denied or timed out, refresh rejected) and
    /// configuration errors for bad environment values or unwritable files.
    pub async fn get_credentials(&self) -> ProviderResult<TokenInfo> {
        self.apply_env_overrides()?;

        if let Some(token) = self.storage.load()?
            && token.is_valid()
        {
            debug!("using stored credential");
            return Ok(token);
        }

        let _guard = self.renew_lock.lock().await;

        let current = self.storage.load()?;
        if let Some(token) = &current
            && token.is_valid()
        {
            debug!("credential was renewed by a concurrent request");
            return Ok(token.clone());
        }

        let token = match current {
            Some(token) if token.is_expired() && token.can_refresh() => self.refresh(token).await?,
            _ => self.interactive().await?,
        };

        self.storage.save(&token)?;
        Ok(token)
    }

    /// Steps 1 and 2: environment values overwrite the local files.
    fn apply_env_overrides(&self) -> ProviderResult<()> {
        if let Some(blob) = self.env.var(&self.config.token_env) {
            let decoded = STANDARD.decode(blob.trim()).map_err(|e| {
                ProviderError::configuration(format!(
                    "{} is not valid base64: {}",
                    self.config.token_env, e
                ))
            })?;
            self.storage.write_raw(&decoded)?;
            debug!("token store overwritten from {}", self.config.token_env);
        }

        if let Some(json) = self.env.var(&self.config.credentials_env) {
            write_private_file(&self.config.credentials_path, json.as_bytes())?;
            debug!(
                "client secret written from {} to {:?}",
                self.config.credentials_env, self.config.credentials_path
            );
        }

        Ok(())
    }

    async fn refresh(&self, mut token: TokenInfo) -> ProviderResult<TokenInfo> {
        let Some(refresh_token) = token.refresh_token.clone() else {
            return Err(ProviderError::authentication("no refresh token available"));
        };

        // The token file carries its own client when written by Google
        // tooling; otherwise fall back to the client secret file.
        let credentials = match (&token.client_id, &token.client_secret) {
            (Some(id), Some(secret)) => OAuthCredentials::new(id.clone(), secret.clone()),
            _ => self.load_client_secret()?,
        };
        let token_url = token
            .token_uri
            .clone()
            .unwrap_or_else(|| self.oauth.token_url().to_string());

        info!("access token expired, refreshing");
        let refreshed = self
            .oauth
            .refresh_token(&credentials, &token_url, &refresh_token)
            .await?;

        token.apply_refresh(
            refreshed.access_token,
            refreshed.expires_in,
            refreshed.refresh_token,
        );
        Ok(token)
    }

    async fn interactive(&self) -> ProviderResult<TokenInfo> {
        if !self.config.interactive {
            return Err(ProviderError::authentication(
                "no valid credential and interactive authorization is disabled; \
                 run `gplugin auth` or set the token environment variable",
            ));
        }
        self.run_authorization().await
    }

    async fn run_authorization(&self) -> ProviderResult<TokenInfo> {
        let credentials = self.load_client_secret()?;
        if let Err(reason) = credentials.validate() {
            warn!("client secret looks unusual: {}", reason);
        }

        self.oauth
            .authorize(
                &credentials,
                &self.config.scopes,
                self.config.loopback_port_range,
            )
            .await
    }

    fn load_client_secret(&self) -> ProviderResult<OAuthCredentials> {
        let path = &self.config.credentials_path;
        if !path.exists() {
            return Err(ProviderError::authentication(format!(
                "no client secret configuration at {}",
                path.display()
            )));
        }
        OAuthCredentials::from_file(path)
    }

    fn client(&self, base_url: &str, token: &TokenInfo, service: &'static str) -> GoogleClient {
        GoogleClient::new(self.http.clone(), base_url, &token.access_token, service)
    }

    pub async fn get_calendar_client(&self) -> ProviderResult<CalendarApi> {
        let token = self.get_credentials().await?;
        Ok(CalendarApi::new(
            self.client(&self.config.endpoints.calendar, &token, "calendar"),
            self.config.calendar_id.clone(),
            self.config.time_zone.clone(),
        ))
    }

    pub async fn get_mail_client(&self) -> ProviderResult<GmailApi> {
        let token = self.get_credentials().await?;
        Ok(GmailApi::new(
            self.client(&self.config.endpoints.gmail, &token, "gmail"),
        ))
    }

    pub async fn get_people_client(&self) -> ProviderResult<PeopleApi> {
        let token = self.get_credentials().await?;
        Ok(PeopleApi::new(
            self.client(&self.config.endpoints.people, &token, "people"),
        ))
    }

    /// Runs the interactive flow regardless of stored state and persists it.
    pub async fn authenticate(&self) -> ProviderResult<TokenInfo> {
        let _guard = self.renew_lock.lock().await;
        let token = self.run_authorization().await?;
        self.storage.save(&token)?;
        info!("credential saved to {:?}", self.storage.path());
        Ok(token)
    }

    /// Reports on the stored credential without touching the network.
    pub fn status(&self) -> ProviderResult<CredentialStatus> {
        let token = self.storage.load()?;
        Ok(CredentialStatus {
            token_path: self.storage.path().to_path_buf(),
            token_present: token.is_some(),
            valid: token.as_ref().is_some_and(TokenInfo::is_valid),
            expires_at: token.as_ref().and_then(|t| t.expires_at),
            has_refresh_token: token.as_ref().is_some_and(TokenInfo::can_refresh),
            scopes: token.map(|t| t.scopes).unwrap_or_default(),
            credentials_path: self.config.credentials_path.clone(),
            credentials_present: self.config.credentials_path.exists(),
        })
    }

    /// Removes the token store. Returns false if there was nothing to remove.
    pub fn logout(&self) -> ProviderResult<bool> {
        let existed = self.storage.exists();
        self.storage.clear()?;
        Ok(existed)
    }
}
