//! The persisted credential.
//!
//! One JSON file in the layout Google's client libraries use for an
//! authorized user (`token`, `refresh_token`, `token_uri`, `client_id`,
//! `client_secret`, `scopes`, `expiry`), so a file produced by those
//! libraries can be dropped in place. Nothing is cached; each call reads
//! the file again.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

/// Tokens this close to expiry are refreshed early.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn expiry_after(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(|secs| Utc::now() + TimeDelta::seconds(secs))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(rename = "token", alias = "access_token")]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// `None` for tokens without a known lifetime; those never expire.
    #[serde(rename = "expiry", alias = "expires_at", default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Token endpoint that issued the refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_after(expires_in_secs),
            scopes,
            token_uri: None,
            client_id: None,
            client_secret: None,
        }
    }

    /// Tags the token with the client that can refresh it.
    #[must_use]
    pub fn with_client(
        self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            token_uri: Some(token_uri.into()),
            ..self
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at - TimeDelta::seconds(EXPIRY_MARGIN_SECS) <= Utc::now())
    }

    /// Usable as-is: non-empty and not expired.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        matches!(self.refresh_token.as_deref(), Some(t) if !t.is_empty())
    }

    /// Takes the outcome of a refresh exchange. The refresh token only
    /// changes when Google rotated it.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expiry_after(expires_in_secs);
        if let Some(rotated) = refresh_token {
            self.refresh_token = Some(rotated);
        }
    }
}

/// Token file on disk.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the stored token. Both a missing and an unparseable file give
    /// `Ok(None)`; the caller then obtains a fresh token and overwrites it.
    pub fn load(&self) -> ProviderResult<Option<TokenInfo>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored token");
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::configuration(format!(
                    "cannot read token file {}: {}",
                    self.path.display(),
                    e
                ))
                .with_source(e));
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.path.display(), "token file does not parse, ignoring it: {}", e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, token: &TokenInfo) -> ProviderResult<()> {
        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| ProviderError::internal(format!("cannot encode token: {}", e)))?;
        write_private_file(&self.path, &json)?;
        debug!(path = %self.path.display(), "token stored");
        Ok(())
    }

    /// Replaces the file with `bytes` verbatim.
    pub fn write_raw(&self, bytes: &[u8]) -> ProviderResult<()> {
        write_private_file(&self.path, bytes)
    }

    /// Deletes the token file; a missing file is not an error.
    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "token removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::configuration(format!(
                "cannot remove token file {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)),
        }
    }
}

/// Replaces `path` with `bytes` through a uniquely named sibling temp file
/// and a rename, so concurrent writers never share a staging file and
/// readers see either the old or the new content. On unix the temp file is
/// created owner read/write only.
pub(crate) fn write_private_file(path: &Path, bytes: &[u8]) -> ProviderResult<()> {
    let io_err = |what: &str, target: &Path, e: std::io::Error| {
        ProviderError::configuration(format!("cannot {} {}: {}", what, target.display(), e))
            .with_source(e)
    };

    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| io_err("create directory", dir, e))?;
            dir
        }
        None => Path::new("."),
    };

    let mut staging = tempfile::Builder::new()
        .prefix(".gplugin-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| io_err("create temp file in", dir, e))?;
    staging
        .write_all(bytes)
        .and_then(|()| staging.as_file().sync_all())
        .map_err(|e| io_err("write", staging.path(), e))?;

    staging
        .persist(path)
        .map(drop)
        .map_err(|e| io_err("replace", path, e.error))
}
