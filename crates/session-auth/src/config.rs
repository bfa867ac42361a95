//! Deployment configuration for the login flow
//!
//! One `AuthConfig` describes one deployment: which identity provider,
//! which application origin the provider redirects back to, and which
//! internal API issues keys. The session-acquisition strategy is fixed per
//! deployment; the two strategies are never mixed in one flow.

use serde::Deserialize;
use tracing::debug;

use crate::constants::{
    API_PROFILE_PATH, API_SESSION_PATH, API_TOKEN_PATH, AUTHORIZE_PATH, CALLBACK_PATH,
    DEFAULT_KEY_LABEL, DEFAULT_SCOPES, LOGOUT_PATH, TOKEN_PATH,
};
use crate::error::{Error, Result};

/// How an authorization code becomes a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStrategy {
    /// Client holds a PKCE verifier and exchanges the code at the provider
    #[default]
    Pkce,
    /// Client forwards the raw code to `/api/auth/session`; no PKCE material
    Brokered,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Identity provider base URL, e.g. `https://example.auth.us-east-1.amazoncognito.com`
    pub provider_url: String,
    /// Public OAuth client identifier
    pub client_id: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    /// Forces a federated upstream provider (`identity_provider` parameter)
    #[serde(default)]
    pub identity_provider: Option<String>,
    /// Application origin; the callback lives at `{origin}/auth/callback/`
    pub origin: String,
    /// Internal API base URL
    pub api_base: String,
    #[serde(default = "default_key_label")]
    pub key_label: String,
    #[serde(default)]
    pub strategy: SessionStrategy,
    /// IANA timezone reported to the profile after login
    #[serde(default)]
    pub timezone: Option<String>,
}

fn default_scopes() -> String {
    DEFAULT_SCOPES.to_string()
}

fn default_key_label() -> String {
    DEFAULT_KEY_LABEL.to_string()
}

impl AuthConfig {
    /// Config for a deployment with default scopes, label and PKCE strategy.
    pub fn new(
        provider_url: impl Into<String>,
        client_id: impl Into<String>,
        origin: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            provider_url: provider_url.into(),
            client_id: client_id.into(),
            scopes: default_scopes(),
            identity_provider: None,
            origin: origin.into(),
            api_base: api_base.into(),
            key_label: default_key_label(),
            strategy: SessionStrategy::Pkce,
            timezone: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("provider_url", &self.provider_url),
            ("origin", &self.origin),
            ("api_base", &self.api_base),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(Error::InvalidConfig(format!(
                    "{name} must start with http:// or https://, got: {value}"
                )));
            }
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidConfig("client_id must not be empty".into()));
        }
        if self.key_label.trim().is_empty() {
            return Err(Error::InvalidConfig("key_label must not be empty".into()));
        }
        Ok(())
    }

    /// `{origin}/auth/callback/`, sent both when authorizing and exchanging.
    pub fn redirect_uri(&self) -> String {
        format!("{}{CALLBACK_PATH}", trim(&self.origin))
    }

    /// `{origin}/`, where the app lands after login or brokered logout.
    pub fn app_root(&self) -> String {
        format!("{}/", trim(&self.origin))
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}{AUTHORIZE_PATH}", trim(&self.provider_url))
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}{TOKEN_PATH}", trim(&self.provider_url))
    }

    pub fn logout_endpoint(&self) -> String {
        format!("{}{LOGOUT_PATH}", trim(&self.provider_url))
    }

    pub fn api_token_endpoint(&self) -> String {
        format!("{}{API_TOKEN_PATH}", trim(&self.api_base))
    }

    pub fn api_session_endpoint(&self) -> String {
        format!("{}{API_SESSION_PATH}", trim(&self.api_base))
    }

    pub fn api_profile_endpoint(&self) -> String {
        format!("{}{API_PROFILE_PATH}", trim(&self.api_base))
    }

    /// Timezone to report: the configured one, else the host's.
    pub fn effective_timezone(&self) -> Option<String> {
        self.timezone
            .clone()
            .filter(|tz| !tz.trim().is_empty())
            .or_else(local_timezone)
    }
}

/// IANA name of the host's local timezone, if the OS exposes one.
pub fn local_timezone() -> Option<String> {
    match iana_time_zone::get_timezone() {
        Ok(tz) if !tz.is_empty() => Some(tz),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "could not detect local timezone");
            None
        }
    }
}

fn trim(base: &str) -> &str {
    base.trim_end_matches('/')
}
