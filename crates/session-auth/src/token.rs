//! Code and key exchanges
//!
//! Three HTTP interactions turn an authorization code into credentials:
//! 1. PKCE code exchange at the provider token endpoint (form-encoded)
//! 2. Brokered code exchange at the internal `/api/auth/session` endpoint
//! 3. API key issuance at `/api/token`, authorized by a provider token
//!
//! None of them retry; the caller decides whether a failure is fatal.

use serde::{Deserialize, Serialize};

use crate::bundle::UserInfo;
use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Response from the provider token endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub id_token: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Response from the brokered session endpoint.
#[derive(Debug, Deserialize)]
pub struct BrokeredSession {
    pub api_key: String,
    pub key_id: String,
    #[serde(default)]
    pub user: UserInfo,
}

/// A freshly issued API key. The raw key is only ever returned once.
#[derive(Debug, Deserialize)]
pub struct IssuedKey {
    pub api_key: String,
    pub key_id: String,
}

/// Exchange an authorization code for tokens with the PKCE verifier.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let redirect_uri = config.redirect_uri();
    let response = client
        .post(config.token_endpoint())
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Hand the raw code to the internal API, which exchanges it server-side
/// and answers with an API key and the user's profile.
pub async fn exchange_code_brokered(
    client: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
) -> Result<BrokeredSession> {
    let response = client
        .post(config.api_session_endpoint())
        .json(&serde_json::json!({
            "code": code,
            "redirect_uri": config.redirect_uri(),
        }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("session exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "session endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<BrokeredSession>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid session response: {e}")))
}

/// Ask the internal API for a new long-lived key labelled `label`.
pub async fn issue_api_key(
    client: &reqwest::Client,
    config: &AuthConfig,
    bearer: &str,
    label: &str,
) -> Result<IssuedKey> {
    let response = client
        .post(config.api_token_endpoint())
        .bearer_auth(bearer)
        .json(&serde_json::json!({ "label": label }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("key issuance request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::KeyExchange(format!(
            "token API returned {status}: {body}"
        )));
    }

    response
        .json::<IssuedKey>()
        .await
        .map_err(|e| Error::KeyExchange(format!("invalid key response: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    use super::*;
    use crate::test_support::{MockServer, test_config};

    #[test]
    fn token_response_refresh_is_optional() {
        let json = r#"{"id_token":"a.b.c","access_token":"at_abc"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "at_abc");
        assert!(token.refresh_token.is_none());

        let serialized = serde_json::to_string(&token).unwrap();
        assert!(!serialized.contains("refresh_token"));
    }

    #[test]
    fn brokered_session_tolerates_extra_user_fields() {
        let json = r#"{"api_key":"k","key_id":"id",
            "user":{"uid":"u1","email":"a@b.com","name":"","picture":""}}"#;
        let session: BrokeredSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.user.email, "a@b.com");
        assert_eq!(session.key_id, "id");
    }

    #[tokio::test]
    async fn exchange_code_posts_pkce_form() {
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let captured = seen.clone();
        let server = MockServer::start(axum::Router::new().route(
            "/oauth2/token",
            post(move |body: String| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = body;
                    Json(serde_json::json!({
                        "id_token": "h.p.s",
                        "access_token": "at_1",
                        "refresh_token": "rt_1",
                    }))
                }
            }),
        ))
        .await;

        let config = test_config(&server.url);
        let client = reqwest::Client::new();
        let tokens = exchange_code(&client, &config, "code-1", "verifier-1")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "at_1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt_1"));

        let body = seen.lock().unwrap().clone();
        assert!(body.contains("grant_type=authorization_code"), "{body}");
        assert!(body.contains("code=code-1"), "{body}");
        assert!(body.contains("code_verifier=verifier-1"), "{body}");
        assert!(body.contains("client_id=client-123"), "{body}");
        assert!(body.contains("redirect_uri=http"), "{body}");
    }

    #[tokio::test]
    async fn exchange_code_rejects_non_success() {
        let server = MockServer::start(axum::Router::new().route(
            "/oauth2/token",
            post(|| async { (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#) }),
        ))
        .await;

        let config = test_config(&server.url);
        let err = exchange_code(&reqwest::Client::new(), &config, "used", "v")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn exchange_code_unreachable_is_http_error() {
        let config = test_config("http://127.0.0.1:1");
        let err = exchange_code(&reqwest::Client::new(), &config, "c", "v")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn brokered_exchange_sends_code_and_redirect_only() {
        let seen = Arc::new(std::sync::Mutex::new(serde_json::Value::Null));
        let captured = seen.clone();
        let server = MockServer::start(axum::Router::new().route(
            "/api/auth/session",
            post(move |Json(body): Json<serde_json::Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = body;
                    Json(serde_json::json!({
                        "api_key": "key_b",
                        "key_id": "kid_b",
                        "user": { "email": "b@c.com", "name": "B", "picture": "" },
                    }))
                }
            }),
        ))
        .await;

        let config = test_config(&server.url);
        let session = exchange_code_brokered(&reqwest::Client::new(), &config, "code-b")
            .await
            .unwrap();
        assert_eq!(session.api_key, "key_b");
        assert_eq!(session.user.name, "B");

        let body = seen.lock().unwrap().clone();
        assert_eq!(body["code"], "code-b");
        assert!(body["redirect_uri"].as_str().unwrap().ends_with("/auth/callback/"));
        assert!(body.get("code_verifier").is_none());
    }

    #[tokio::test]
    async fn issue_api_key_sends_bearer_and_label() {
        let server = MockServer::start(axum::Router::new().route(
            "/api/token",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth != "Bearer at_1" || body["label"] != "Web UI" {
                    return (StatusCode::BAD_REQUEST, Json(serde_json::json!({})));
                }
                (
                    StatusCode::CREATED,
                    Json(serde_json::json!({ "api_key": "key_1", "key_id": "kid_1" })),
                )
            }),
        ))
        .await;

        let config = test_config(&server.url);
        let key = issue_api_key(&reqwest::Client::new(), &config, "at_1", "Web UI")
            .await
            .unwrap();
        assert_eq!(key.api_key, "key_1");
        assert_eq!(key.key_id, "kid_1");
    }

    #[tokio::test]
    async fn issue_api_key_rejection_is_key_exchange_error() {
        let server = MockServer::start(axum::Router::new().route(
            "/api/token",
            post(|| async { (StatusCode::UNAUTHORIZED, "unauthorized") }),
        ))
        .await;

        let config = test_config(&server.url);
        let err = issue_api_key(&reqwest::Client::new(), &config, "bad", "Web UI")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyExchange(_)), "got: {err:?}");
    }
}
