//! The OAuth token endpoint client.
//!
//! # Request
//!
//! ```text
//! POST {token_url}
//! Content-Type: application/json
//!
//! {"grant_type": "refresh_token", "refresh_token": "...",
//!  "client_id": "...", "scope": "..."}
//! ```
//!
//! Refresh tokens are single-use upstream: callers must hold the
//! refresh-identity lock around every invocation.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use cauth_core::RefreshPayload;

use crate::error::EngineError;

// ============================================================================
// Constants
// ============================================================================

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://platform.claude.com/v1/oauth/token";

/// Environment override for the token endpoint.
pub const TOKEN_URL_ENV: &str = "CLAUDE_CODE_TOKEN_URL";

/// Claude Code public OAuth client ID.
pub const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// Request timeout.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// How much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 200;

// ============================================================================
// Token Refresher
// ============================================================================

/// Client for the OAuth token endpoint.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    token_url: String,
    client_id: String,
}

impl Default for TokenRefresher {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRefresher {
    /// Creates a refresher against the default (or env-overridden) endpoint.
    pub fn new() -> Self {
        let token_url =
            std::env::var(TOKEN_URL_ENV).unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());
        Self::with_endpoint(token_url, CLIENT_ID)
    }

    /// Creates a refresher with an explicit endpoint and client ID.
    pub fn with_endpoint(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
        }
    }

    /// Exchanges a refresh token for a new token payload.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        scope: &str,
    ) -> Result<RefreshPayload, EngineError> {
        debug!(url = %self.token_url, "Refreshing token");

        let client = reqwest::Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()?;
        let response = client
            .post(&self.token_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
                "client_id": self.client_id,
                "scope": scope,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token endpoint rejected refresh");
            return Err(EngineError::RefreshFailed {
                status: status.as_u16(),
                body: truncate_bytes(&body, ERROR_BODY_LIMIT),
            });
        }

        let body: Value = response.json().await.map_err(|_| {
            EngineError::RefreshResponseInvalid("refresh response is not JSON object".to_string())
        })?;
        Self::parse_payload(&body)
    }

    fn parse_payload(body: &Value) -> Result<RefreshPayload, EngineError> {
        let Some(object) = body.as_object() else {
            return Err(EngineError::RefreshResponseInvalid(
                "refresh response is not JSON object".to_string(),
            ));
        };

        let access_token = trimmed(object.get("access_token")).ok_or_else(|| {
            EngineError::RefreshResponseInvalid(
                "refresh response missing access_token".to_string(),
            )
        })?;

        Ok(RefreshPayload {
            access_token,
            refresh_token: trimmed(object.get("refresh_token")),
            expires_in: object.get("expires_in").and_then(Value::as_i64),
            scope: trimmed(object.get("scope")),
        })
    }
}

fn trimmed(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Keeps at most `limit` bytes, backing up to the nearest UTF-8 boundary.
fn truncate_bytes(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_refresh_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "rt-before",
                "client_id": CLIENT_ID,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": " at-after ",
                "refresh_token": "rt-after",
                "expires_in": 28800,
                "scope": "user:profile user:inference"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refresher =
            TokenRefresher::with_endpoint(format!("{}/v1/oauth/token", server.uri()), CLIENT_ID);
        let payload = refresher.refresh("rt-before", "user:profile").await.unwrap();

        assert_eq!(payload.access_token, "at-after");
        assert_eq!(payload.refresh_token.as_deref(), Some("rt-after"));
        assert_eq!(payload.expires_in, Some(28800));
        assert_eq!(payload.scope.as_deref(), Some("user:profile user:inference"));
    }

    #[tokio::test]
    async fn test_refresh_empty_optionals_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "refresh_token": "  ",
                "scope": ""
            })))
            .mount(&server)
            .await;

        let refresher = TokenRefresher::with_endpoint(server.uri(), CLIENT_ID);
        let payload = refresher.refresh("rt", "").await.unwrap();
        assert_eq!(payload.refresh_token, None);
        assert_eq!(payload.scope, None);
        assert_eq!(payload.expires_in, None);
    }

    #[tokio::test]
    async fn test_refresh_http_error_truncates_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let refresher = TokenRefresher::with_endpoint(server.uri(), CLIENT_ID);
        let err = refresher.refresh("rt", "").await.unwrap_err();
        match err {
            EngineError::RefreshFailed { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body.len(), 200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_error_body_truncates_on_utf8_boundary() {
        let server = MockServer::start().await;
        // 3-byte characters: 200 bytes is not a boundary (198 is).
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("界".repeat(100)))
            .mount(&server)
            .await;

        let refresher = TokenRefresher::with_endpoint(server.uri(), CLIENT_ID);
        let err = refresher.refresh("rt", "").await.unwrap_err();
        match err {
            EngineError::RefreshFailed { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), 198);
                assert!(body.chars().all(|c| c == '界'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncate_bytes_short_body_untouched() {
        assert_eq!(truncate_bytes("short", 200), "short");
        assert_eq!(truncate_bytes("éé", 3), "é");
    }

    #[tokio::test]
    async fn test_refresh_missing_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
            .mount(&server)
            .await;

        let refresher = TokenRefresher::with_endpoint(server.uri(), CLIENT_ID);
        let err = refresher.refresh("rt", "").await.unwrap_err();
        assert!(matches!(err, EngineError::RefreshResponseInvalid(msg)
            if msg == "refresh response missing access_token"));
    }

    #[tokio::test]
    async fn test_refresh_non_object_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "object"])))
            .mount(&server)
            .await;

        let refresher = TokenRefresher::with_endpoint(server.uri(), CLIENT_ID);
        let err = refresher.refresh("rt", "").await.unwrap_err();
        assert!(matches!(err, EngineError::RefreshResponseInvalid(msg)
            if msg == "refresh response is not JSON object"));
    }
}
