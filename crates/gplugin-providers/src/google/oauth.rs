//! Google's installed-application OAuth flow.
//!
//! [`OAuthClient::authorize`] runs the browser consent with PKCE (RFC 7636)
//! and a redirect to a listener on 127.0.0.1. [`OAuthClient::refresh_token`]
//! trades a stored refresh token for a new access token. Both talk to the
//! token endpoint through [`Grant`].

use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;
use super::tokens::TokenInfo;

/// How long the user has to finish the consent screen.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

const ACCEPT_POLL: Duration = Duration::from_millis(100);

const REDIRECT_PATH: &str = "/callback";

const PAGE_DONE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
    Connection: close\r\n\r\n<html><body><p>gplugin is authorized. \
    You can close this tab.</p></body></html>";

const PAGE_FAILED: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html; charset=utf-8\r\n\
    Connection: close\r\n\r\n<html><body><p>Authorization did not complete. \
    Check the gplugin logs.</p></body></html>";

/// New access token from a refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Set when Google rotated the refresh token.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
    auth_url: String,
    token_url: String,
}

impl OAuthClient {
    pub fn new(
        http_client: reqwest::Client,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
        }
    }

    /// Configured token endpoint.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Walks the user through consent in the browser and returns the
    /// resulting token, tagged with the client that obtained it.
    ///
    /// # Errors
    ///
    /// Configuration error when no loopback port is free; authentication
    /// error when the user declines, the state does not round-trip, the
    /// consent times out or the code exchange is rejected.
    pub async fn authorize(
        &self,
        credentials: &OAuthCredentials,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceParams::generate();
        let redirect = LoopbackRedirect::bind(port_range)?;
        let redirect_uri = redirect.redirect_uri();

        let consent_url =
            pkce.consent_url(&self.auth_url, &credentials.client_id, &redirect_uri, scopes)?;
        info!(%consent_url, "opening the Google consent page; visit the URL if no browser appears");
        if let Err(e) = open::that(consent_url.as_str()) {
            warn!("could not launch a browser: {}", e);
        }

        let callback = tokio::task::spawn_blocking(move || redirect.wait(CONSENT_TIMEOUT))
            .await
            .map_err(|e| ProviderError::internal(format!("loopback listener task failed: {}", e)))??;

        if callback.state != pkce.state {
            return Err(ProviderError::authentication(
                "state parameter in the redirect does not match the request",
            ));
        }

        debug!("authorization code received");
        let grant = Grant::AuthorizationCode {
            code: &callback.code,
            verifier: &pkce.verifier,
            redirect_uri: &redirect_uri,
        };
        let response = self.request_token(&self.token_url, credentials, grant).await?;
        info!("authorization complete");

        let granted = match response.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => scopes.to_vec(),
        };
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            granted,
        )
        .with_client(&credentials.client_id, &credentials.client_secret, &self.token_url))
    }

    /// Exchanges `refresh_token` at `token_url`.
    ///
    /// A rejected refresh token comes back as an authentication error that
    /// carries Google's response body.
    pub async fn refresh_token(
        &self,
        credentials: &OAuthCredentials,
        token_url: &str,
        refresh_token: &str,
    ) -> ProviderResult<RefreshedToken> {
        let response = self
            .request_token(token_url, credentials, Grant::Refresh { refresh_token })
            .await?;
        info!("access token refreshed");
        Ok(RefreshedToken {
            access_token: response.access_token,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
        })
    }

    async fn request_token(
        &self,
        token_url: &str,
        credentials: &OAuthCredentials,
        grant: Grant<'_>,
    ) -> ProviderResult<TokenEndpointResponse> {
        let oauth_err = |e: ProviderError| e.with_provider("oauth");

        let response = self
            .http_client
            .post(token_url)
            .form(&grant.form(credentials))
            .send()
            .await
            .map_err(|e| oauth_err(ProviderError::network(format!("{}: {}", grant.name(), e))))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            oauth_err(ProviderError::network(format!("{} response: {}", grant.name(), e)))
        })?;

        if !status.is_success() {
            return Err(oauth_err(ProviderError::authentication(format!(
                "{} rejected with {}: {}",
                grant.name(),
                status,
                body.trim()
            ))));
        }

        serde_json::from_str(&body).map_err(|e| {
            oauth_err(ProviderError::invalid_response(format!(
                "unexpected token endpoint response: {}",
                e
            )))
        })
    }
}

/// Grant types sent to the token endpoint.
#[derive(Debug, Clone, Copy)]
enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        verifier: &'a str,
        redirect_uri: &'a str,
    },
    Refresh {
        refresh_token: &'a str,
    },
}

impl<'a> Grant<'a> {
    fn name(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "code exchange",
            Self::Refresh { .. } => "token refresh",
        }
    }

    fn form(&self, credentials: &'a OAuthCredentials) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        match *self {
            Self::AuthorizationCode {
                code,
                verifier,
                redirect_uri,
            } => form.extend([
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", verifier),
                ("redirect_uri", redirect_uri),
            ]),
            Self::Refresh { refresh_token } => form.extend([
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]),
        }
        form
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Verifier, challenge and state for one consent round-trip.
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, sent with method S256.
    pub challenge: String,
    pub state: String,
}

impl PkceParams {
    pub fn generate() -> Self {
        let verifier = random_token(32);
        Self {
            challenge: s256_challenge(&verifier),
            verifier,
            state: random_token(16),
        }
    }

    /// Consent page URL. Offline access with a forced consent prompt so
    /// Google hands out a refresh token on every authorization.
    pub fn consent_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Url> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            auth_endpoint,
            [
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| {
            ProviderError::configuration(format!("bad authorization endpoint {}: {}", auth_endpoint, e))
        })
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Code and state delivered to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AuthorizationCallback {
    code: String,
    state: String,
}

/// Listener on 127.0.0.1 that receives Google's redirect.
#[derive(Debug)]
struct LoopbackRedirect {
    listener: TcpListener,
    port: u16,
}

impl LoopbackRedirect {
    /// Binds the first free port of the inclusive range; `(0, 0)` lets the
    /// OS choose.
    fn bind((first, last): (u16, u16)) -> ProviderResult<Self> {
        let found = (first..=last).find_map(|port| TcpListener::bind(("127.0.0.1", port)).ok());
        let Some(listener) = found else {
            return Err(ProviderError::configuration(format!(
                "no available port in range {}-{} for the OAuth redirect",
                first, last
            )));
        };
        let port = listener
            .local_addr()
            .map_err(|e| ProviderError::internal(format!("loopback listener address: {}", e)))?
            .port();
        debug!(port, "OAuth redirect listener bound");
        Ok(Self { listener, port })
    }

    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, REDIRECT_PATH)
    }

    /// Blocks until the redirect arrives or `timeout` elapses. Requests for
    /// other paths (the browser's favicon probe) are answered and skipped.
    fn wait(self, timeout: Duration) -> ProviderResult<AuthorizationCallback> {
        let io_err = |e: io::Error| ProviderError::internal(format!("OAuth redirect listener: {}", e));
        self.listener.set_nonblocking(true).map_err(io_err)?;
        let deadline = Instant::now() + timeout;

        loop {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    if let Some(outcome) = serve_redirect(stream) {
                        return outcome;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(ProviderError::authentication(
                            "timed out waiting for the OAuth redirect",
                        ));
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => warn!("OAuth redirect listener accept failed: {}", e),
            }
        }
    }
}

/// Answers one browser request. `None` means it was not the redirect.
fn serve_redirect(mut stream: TcpStream) -> Option<ProviderResult<AuthorizationCallback>> {
    if stream.set_nonblocking(false).is_err() {
        return None;
    }
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let Some(query) = parse_redirect(&request_line) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n");
        return None;
    };

    let outcome = query.into_callback();
    let page = if outcome.is_ok() { PAGE_DONE } else { PAGE_FAILED };
    let _ = stream.write_all(page.as_bytes());
    let _ = stream.flush();
    Some(outcome)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RedirectQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl RedirectQuery {
    fn into_callback(self) -> ProviderResult<AuthorizationCallback> {
        if let Some(error) = self.error {
            return Err(ProviderError::authentication(format!(
                "authorization denied: {}",
                error
            )));
        }
        match self.code {
            Some(code) => Ok(AuthorizationCallback {
                code,
                state: self.state.unwrap_or_default(),
            }),
            None => Err(ProviderError::authentication(
                "OAuth redirect carried no authorization code",
            )),
        }
    }
}

/// Reads the query of a `GET /callback?... HTTP/1.1` request line.
fn parse_redirect(request_line: &str) -> Option<RedirectQuery> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = Url::parse(&format!("http://127.0.0.1{}", parts.next()?)).ok()?;
    if target.path() != REDIRECT_PATH {
        return None;
    }

    let mut query = RedirectQuery::default();
    for (key, value) in target.query_pairs() {
        let slot = match key.as_ref() {
            "code" => &mut query.code,
            "state" => &mut query.state,
            "error" => &mut query.error,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }
    Some(query)
}
