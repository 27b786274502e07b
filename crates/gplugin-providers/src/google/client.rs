//! Authenticated HTTP client for Google REST APIs.
//!
//! Injects the bearer token, decodes JSON bodies and turns Google's error
//! envelope (`{"error": {"code", "message"}}`) into a [`ProviderError`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{ProviderError, ProviderResult};

/// Connection timeout applied to every Google request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the reqwest client shared by every service client.
pub fn build_http_client(timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::internal(format!("failed to build HTTP client: {}", e)))
}

/// A Google API client bound to one service base URL and one access token.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    http: Client,
    base_url: String,
    access_token: String,
    /// Service name reported in errors ("calendar", "gmail", "people").
    service: &'static str,
}

impl GoogleClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        service: &'static str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            service,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins a path onto the service base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<Value> {
        let builder = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(&self.access_token);
        self.execute_request(builder).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> ProviderResult<Value> {
        let builder = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .json(body);
        self.execute_request(builder).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> ProviderResult<Value> {
        let builder = self
            .http
            .put(self.url(path))
            .bearer_auth(&self.access_token)
            .json(body);
        self.execute_request(builder).await
    }

    pub async fn delete(&self, path: &str) -> ProviderResult<Value> {
        let builder = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.access_token);
        self.execute_request(builder).await
    }

    async fn execute_request(&self, builder: RequestBuilder) -> ProviderResult<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e).with_provider(self.service))?;

        let status = response.status();
        debug!(service = self.service, %status, "google response");

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(service = self.service, "rate limited by Google");
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response body: {}", e))
                .with_provider(self.service)
        })?;

        if !status.is_success() {
            let message = extract_error_message(&body, status);
            error!(service = self.service, "Google API error: {}", message);
            return Err(ProviderError::from_status(status, message).with_provider(self.service));
        }

        // DELETE answers 204 with no body.
        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse JSON response: {}", e))
                .with_provider(self.service)
        })
    }
}

/// Pulls `error.message` out of a Google error body.
fn extract_error_message(body: &str, status: StatusCode) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    if let Some(message) = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_i64)
            .unwrap_or(i64::from(status.as_u16()));
        return format!("Google API error {}: {}", code, message);
    }

    // The token endpoint uses {"error": "invalid_grant", "error_description": ...}
    if let Some(code) = error.and_then(Value::as_str) {
        let description = parsed
            .as_ref()
            .and_then(|v| v.get("error_description"))
            .and_then(Value::as_str)
            .unwrap_or("");
        return format!("{} {}", code, description).trim_end().to_string();
    }

    format!("HTTP {} error", status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        assert_eq!(
            extract_error_message(body, StatusCode::NOT_FOUND),
            "Google API error 404: Requested entity was not found."
        );
    }

    #[test]
    fn extracts_oauth_style_error() {
        let body = r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;
        assert_eq!(
            extract_error_message(body, StatusCode::BAD_REQUEST),
            "invalid_grant Token has been expired or revoked."
        );
    }

    #[test]
    fn falls_back_to_status() {
        assert_eq!(
            extract_error_message("<html>oops</html>", StatusCode::BAD_GATEWAY),
            "HTTP 502 Bad Gateway error"
        );
    }

    #[test]
    fn url_joins_paths() {
        let client = GoogleClient::new(
            Client::new(),
            "https://gmail.googleapis.com/gmail/v1/",
            "tok",
            "gmail",
        );
        assert_eq!(
            client.url("/users/me/labels"),
            "https://gmail.googleapis.com/gmail/v1/users/me/labels"
        );
    }
}
