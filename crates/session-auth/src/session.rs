//! Session resolution: who is signed in, and with which credential
//!
//! Everything here is a synchronous read of the durable store, cheap enough
//! to call on every render and before every API request. The only write is
//! the clear-on-expiry in [`Session::current_user`].

use std::sync::Arc;

use common::Secret;
use tracing::{debug, info, warn};

use crate::bundle::{CredentialBundle, UserInfo};
use crate::claims::decode_claims;
use crate::constants::{
    ACCESS_TOKEN_KEY, API_KEY_ID_KEY, API_KEY_KEY, BUNDLE_KEYS, ID_TOKEN_KEY, REFRESH_TOKEN_KEY,
    USER_INFO_KEY,
};
use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use crate::token::TokenResponse;

/// Handle on the credential bundle in a durable store.
///
/// Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Option<String> {
        self.store.get(key).filter(|v| !v.is_empty())
    }

    /// The signed-in user, or `None`.
    pub fn current_user(&self) -> Option<UserInfo> {
        self.current_user_at(now_millis())
    }

    /// [`Session::current_user`] against an explicit clock.
    ///
    /// 1. Cached `user_info` is trusted when an API key exists.
    /// 2. Otherwise the identity token's claims are decoded. An expired token
    ///    without an API key signs the user out (bundle cleared); with an API
    ///    key the stale claims are still good enough for display.
    /// 3. No identity token means nobody is signed in.
    pub fn current_user_at(&self, now_millis: u64) -> Option<UserInfo> {
        let has_api_key = self.has_api_key();

        if has_api_key {
            if let Some(user) = self.cached_user() {
                return Some(user);
            }
        }

        let id_token = self.read(ID_TOKEN_KEY)?;
        let claims = match decode_claims(&id_token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "stored identity token is unreadable");
                return None;
            }
        };

        // Re-read at the time of the check; the API key is the authority.
        if claims.is_expired_at(now_millis) && !self.has_api_key() {
            info!("identity token expired and no API key, signing out");
            self.clear_logged();
            return None;
        }

        Some(claims.profile())
    }

    pub fn has_session(&self) -> bool {
        self.current_user().is_some()
    }

    /// Bearer value for outbound API calls: the API key, else the provider
    /// access token, else `None` (skip calls that need auth).
    pub fn access_credential(&self) -> Option<Secret<String>> {
        self.read(API_KEY_KEY)
            .or_else(|| self.read(ACCESS_TOKEN_KEY))
            .map(Secret::new)
    }

    /// Identifier of this session's API key, to mark it among issued keys.
    pub fn api_key_id(&self) -> Option<String> {
        self.read(API_KEY_ID_KEY)
    }

    pub fn has_api_key(&self) -> bool {
        self.read(API_KEY_KEY).is_some()
    }

    pub fn bundle(&self) -> CredentialBundle {
        CredentialBundle::load(self.store.as_ref())
    }

    /// Remove every credential at once.
    pub fn clear(&self) -> Result<()> {
        self.store.remove_all(&BUNDLE_KEYS)?;
        debug!("credential bundle cleared");
        Ok(())
    }

    /// [`Session::clear`] for callers with nobody to report to.
    pub(crate) fn clear_logged(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to clear credential bundle");
        }
    }

    fn cached_user(&self) -> Option<UserInfo> {
        let raw = self.read(USER_INFO_KEY)?;
        serde_json::from_str(&raw)
            .inspect_err(|e| debug!(error = %e, "cached user info unreadable, decoding token"))
            .ok()
    }

    pub(crate) fn store_tokens(&self, tokens: &TokenResponse) -> Result<()> {
        let mut entries = vec![
            (ID_TOKEN_KEY, tokens.id_token.as_str()),
            (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
        ];
        if let Some(refresh) = tokens.refresh_token.as_deref() {
            entries.push((REFRESH_TOKEN_KEY, refresh));
        }
        self.store.set_all(&entries)
    }

    pub(crate) fn store_user_info(&self, user: &UserInfo) -> Result<()> {
        let json = serde_json::to_string(user)
            .map_err(|e| Error::StoreParse(format!("serializing user info: {e}")))?;
        self.store.set(USER_INFO_KEY, &json)
    }

    pub(crate) fn store_api_key(&self, api_key: &str, key_id: &str) -> Result<()> {
        self.store
            .set_all(&[(API_KEY_KEY, api_key), (API_KEY_ID_KEY, key_id)])
    }

    /// Use `api_key` as this session's credential unless one is already stored.
    ///
    /// Returns whether it was adopted.
    pub fn adopt_api_key(&self, api_key: &str, key_id: &str) -> Result<bool> {
        if self.has_api_key() {
            return Ok(false);
        }
        self.store_api_key(api_key, key_id)?;
        info!(key_id, "adopted API key for this session");
        Ok(true)
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
