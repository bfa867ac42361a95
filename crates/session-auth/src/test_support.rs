//! Shared helpers for unit tests: in-process mock provider/API and token builders.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::net::TcpListener;

use crate::config::AuthConfig;

/// An axum app served on an ephemeral local port, stopped on drop.
pub struct MockServer {
    pub url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start(app: axum::Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{addr}"),
            handle,
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Config whose provider and API both point at `base`.
pub fn test_config(base: &str) -> AuthConfig {
    AuthConfig::new(base, "client-123", "http://app.test", base)
}

/// Unsigned JWT-shaped token carrying `claims`.
pub fn id_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
