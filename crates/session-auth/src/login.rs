//! Login, callback, API-key exchange and logout
//!
//! `LoginFlow` owns the two stores a browser would have: the durable
//! credential store (via [`Session`]) and a session-scoped store for the
//! PKCE verifier. It never navigates itself; operations that leave the page
//! return the URL to open.
//!
//! Callback sequencing: the code exchange and token persistence are the only
//! steps that decide the outcome. Claim caching, API-key exchange and the
//! timezone report run afterwards, each logged and swallowed on failure,
//! and never roll back what was already persisted.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::claims::decode_claims;
use crate::config::{AuthConfig, SessionStrategy};
use crate::constants::PKCE_VERIFIER_KEY;
use crate::error::{Error, Result};
use crate::pkce::{PkceChallenge, build_authorization_url};
use crate::session::Session;
use crate::store::KeyValueStore;
use crate::token::{self, TokenResponse};

/// Outcome of [`LoginFlow::ensure_api_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchange {
    /// A key was already stored and was left as is
    AlreadyPresent,
    /// A new key was issued and stored
    Issued,
}

#[derive(Clone)]
pub struct LoginFlow {
    config: AuthConfig,
    http: reqwest::Client,
    session: Session,
    pending: Arc<dyn KeyValueStore>,
    logout_target: Url,
}

impl LoginFlow {
    /// `durable` holds the credential bundle; `pending` must survive the
    /// redirect round trip but should not outlive the login attempt.
    pub fn new(
        config: AuthConfig,
        http: reqwest::Client,
        durable: Arc<dyn KeyValueStore>,
        pending: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;
        let logout_target = logout_target(&config)?;
        Ok(Self {
            config,
            http,
            session: Session::new(durable),
            pending,
            logout_target,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Start a login: returns the provider authorization URL to open.
    ///
    /// For PKCE a fresh verifier is persisted before the URL is handed out,
    /// replacing any verifier from an abandoned attempt.
    pub fn begin_login(&self) -> Result<Url> {
        let url = match self.config.strategy {
            SessionStrategy::Pkce => {
                let pkce = PkceChallenge::generate();
                self.pending.set(PKCE_VERIFIER_KEY, &pkce.verifier)?;
                build_authorization_url(&self.config, Some(&pkce.challenge))?
            }
            SessionStrategy::Brokered => build_authorization_url(&self.config, None)?,
        };
        info!(strategy = ?self.config.strategy, "login started");
        Ok(url)
    }

    /// Handle a provider redirect to the callback path.
    ///
    /// Returns `true` once credentials are persisted; the caller then sends
    /// the user to [`AuthConfig::app_root`]. Returns `false` without any
    /// network call or storage write when `callback_url` carries no `code`,
    /// so it is safe to call on every page load. Never retry on `false`:
    /// the verifier is consumed and the code is single-use.
    #[instrument(skip_all, fields(strategy = ?self.config.strategy))]
    pub async fn complete_login(&self, callback_url: &Url) -> bool {
        let Some(code) = callback_code(callback_url) else {
            return false;
        };

        let result = match self.config.strategy {
            SessionStrategy::Pkce => self.complete_pkce(&code).await,
            SessionStrategy::Brokered => self.complete_brokered(&code).await,
        };

        match result {
            Ok(()) => {
                self.report_timezone_logged().await;
                info!("login completed");
                true
            }
            Err(e) => {
                warn!(error = %e, "login callback failed");
                false
            }
        }
    }

    async fn complete_pkce(&self, code: &str) -> Result<()> {
        let verifier = self
            .pending
            .take(PKCE_VERIFIER_KEY)?
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingVerifier)?;

        let tokens = token::exchange_code(&self.http, &self.config, code, &verifier).await?;
        self.session.store_tokens(&tokens)?;
        debug!(
            has_refresh = tokens.refresh_token.is_some(),
            "provider tokens stored"
        );

        self.cache_profile_logged(&tokens);

        if let Err(e) = self.ensure_api_key(&tokens.access_token).await {
            warn!(error = %e, "API key exchange failed, using provider token for this session");
        }
        Ok(())
    }

    async fn complete_brokered(&self, code: &str) -> Result<()> {
        let brokered = token::exchange_code_brokered(&self.http, &self.config, code).await?;
        self.session.store_api_key(&brokered.api_key, &brokered.key_id)?;
        let user = brokered.user.with_name_fallback();
        if let Err(e) = self.session.store_user_info(&user) {
            warn!(error = %e, "failed to cache user info");
        }
        debug!(key_id = %brokered.key_id, "brokered session stored");
        Ok(())
    }

    fn cache_profile_logged(&self, tokens: &TokenResponse) {
        let cached = decode_claims(&tokens.id_token)
            .and_then(|claims| self.session.store_user_info(&claims.profile()));
        if let Err(e) = cached {
            warn!(error = %e, "could not cache profile from identity token");
        }
    }

    /// Trade a provider token for a long-lived API key.
    ///
    /// Never replaces an existing key, so repeated logins from one profile
    /// keep the same key. On failure the bundle is unchanged and the next
    /// full login tries again.
    pub async fn ensure_api_key(&self, bearer: &str) -> Result<KeyExchange> {
        if self.session.has_api_key() {
            debug!("API key already present, skipping exchange");
            return Ok(KeyExchange::AlreadyPresent);
        }

        let issued =
            token::issue_api_key(&self.http, &self.config, bearer, &self.config.key_label).await?;
        // Never overwrite a key stored by another login in the meantime.
        if self.session.has_api_key() {
            return Ok(KeyExchange::AlreadyPresent);
        }
        self.session.store_api_key(&issued.api_key, &issued.key_id)?;
        info!(key_id = %issued.key_id, "API key issued");
        Ok(KeyExchange::Issued)
    }

    /// Save the user's timezone to their profile with the API key.
    ///
    /// The configured timezone wins; otherwise the host's is detected.
    /// Returns `Ok(false)` when there is no API key or no timezone to send.
    pub async fn report_timezone(&self) -> Result<bool> {
        let (Some(api_key), Some(timezone)) =
            (self.session.bundle().api_key, self.config.effective_timezone())
        else {
            return Ok(false);
        };

        let response = self
            .http
            .put(self.config.api_profile_endpoint())
            .bearer_auth(&api_key)
            .json(&serde_json::json!({ "timezone": timezone }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("profile update request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Profile(format!("profile API returned {status}")));
        }
        debug!(%timezone, "timezone saved to profile");
        Ok(true)
    }

    async fn report_timezone_logged(&self) {
        if let Err(e) = self.report_timezone().await {
            debug!(error = %e, "timezone report failed");
        }
    }

    /// Sign out: clears the bundle and returns where to navigate.
    ///
    /// PKCE deployments end the provider's hosted session too, so the next
    /// login cannot silently reuse it. Brokered deployments go to the app root.
    pub fn logout(&self) -> Url {
        self.session.clear_logged();
        if let Err(e) = self.pending.remove(PKCE_VERIFIER_KEY) {
            debug!(error = %e, "failed to drop pending verifier");
        }
        info!("logged out");
        self.logout_target.clone()
    }
}

/// PKCE deployments end the provider's hosted session; brokered ones go home.
fn logout_target(config: &AuthConfig) -> Result<Url> {
    let root = config.app_root();
    let target = match config.strategy {
        SessionStrategy::Pkce => Url::parse_with_params(
            &config.logout_endpoint(),
            &[
                ("client_id", config.client_id.as_str()),
                ("logout_uri", root.as_str()),
            ],
        ),
        SessionStrategy::Brokered => Url::parse(&root),
    };
    target.map_err(|e| Error::InvalidConfig(format!("logout URL: {e}")))
}

/// The non-empty `code` query parameter of a callback URL.
fn callback_code(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}
