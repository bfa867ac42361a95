//! Request and response handling shared by every API call
//!
//! Request side: attach `Authorization: Bearer` when the session has a
//! credential, and send nothing otherwise (never an empty header).
//! Response side: classify failures, notify the user, and on 401 clear the
//! session so the next render starts signed out.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use session_auth::Session;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ApiError, Result};
use crate::notice::{Notice, NoticeSink, RELOAD_DELAY};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    session: Session,
    notices: Arc<dyn NoticeSink>,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base: impl Into<String>,
        session: Session,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            session,
            notices,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Start a request to `path`, with the bearer credential if there is one.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorize(self.http.request(method, self.url(path)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.access_credential() {
            Some(credential) => builder.header(AUTHORIZATION, credential.bearer()),
            None => builder,
        }
    }

    /// Send a request and turn every failure into a notice plus an error.
    #[instrument(skip_all)]
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "API request failed without response");
                self.notices.notify(Notice::NetworkUnreachable);
                return Err(ApiError::Network(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("API rejected credentials, clearing session");
            self.notices.notify(Notice::SessionExpired {
                reload_after: RELOAD_DELAY,
            });
            if let Err(e) = self.session.clear() {
                warn!(error = %e, "failed to clear session after 401");
            }
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let message = failure_message(status.as_u16(), &body);
        debug!(status = status.as_u16(), reason = %message, "API request failed");
        self.notices.notify(Notice::RequestFailed(message.clone()));
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        decode(response).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send(self.request(Method::PUT, path).json(body)).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let url = Url::parse_with_params(&self.url(path), query)
            .map_err(|e| ApiError::Url(e.to_string()))?;
        self.send(self.authorize(self.http.delete(url))).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Plain-text bodies are the server's message; JSON or empty bodies get
/// the generic status line instead.
fn failure_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() || serde_json::from_str::<serde_json::Value>(body).is_ok() {
        format!("Request failed with status code {status}")
    } else {
        body.to_string()
    }
}
