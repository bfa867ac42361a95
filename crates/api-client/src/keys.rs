//! API key management
//!
//! Lists, issues and revokes the user's API keys. One of them may be the
//! key this session signs in with; revoking that one signs the user out.

use serde::{Deserialize, Serialize};
use session_auth::IssuedKey;
use session_auth::constants::API_TOKEN_PATH;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub key_id: String,
    #[serde(default)]
    pub label: String,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub created_at: String,
}

impl ApiKeyInfo {
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            "Untitled"
        } else {
            &self.label
        }
    }
}

/// A key plus whether it is the one this session uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub info: ApiKeyInfo,
    pub current_session: bool,
}

/// What a successful revoke did to the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revoked {
    /// Some other key; the session is unaffected
    OtherKey,
    /// This session's own key; the session has been cleared
    CurrentSession,
}

impl ApiClient {
    /// All keys of the signed-in user, oldest first.
    pub async fn list_keys(&self) -> Result<Vec<ApiKeyInfo>> {
        let keys: Option<Vec<ApiKeyInfo>> = self.get_json(API_TOKEN_PATH).await?;
        let mut keys = keys.unwrap_or_default();
        // RFC 3339 strings in one timezone sort chronologically.
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(keys)
    }

    /// Issue a new key. The raw key is only returned here, never listed again.
    ///
    /// A session signed in with a provider token only (its own key exchange
    /// failed) adopts the new key as its credential.
    pub async fn create_key(&self, label: &str) -> Result<IssuedKey> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ApiError::Validation("label is required".into()));
        }
        let issued: IssuedKey = self
            .post_json(API_TOKEN_PATH, &serde_json::json!({ "label": label }))
            .await?;
        info!(key_id = %issued.key_id, "API key created");
        if let Err(e) = self.session().adopt_api_key(&issued.api_key, &issued.key_id) {
            warn!(error = %e, "failed to store new key as session credential");
        }
        Ok(issued)
    }

    pub async fn revoke_key(&self, key_id: &str) -> Result<Revoked> {
        if key_id.is_empty() {
            return Err(ApiError::Validation("key id is required".into()));
        }
        let is_current = self.session().api_key_id().as_deref() == Some(key_id);

        self.delete(API_TOKEN_PATH, &[("id", key_id)]).await?;
        info!(key_id, current_session = is_current, "API key revoked");

        if is_current {
            if let Err(e) = self.session().clear() {
                warn!(error = %e, "failed to clear session after revoking its key");
            }
            return Ok(Revoked::CurrentSession);
        }
        Ok(Revoked::OtherKey)
    }

    /// Mark which of `keys` belongs to this session.
    pub fn annotate(&self, keys: Vec<ApiKeyInfo>) -> Vec<KeyRow> {
        let current = self.session().api_key_id();
        keys.into_iter()
            .map(|info| KeyRow {
                current_session: current.as_deref() == Some(info.key_id.as_str()),
                info,
            })
            .collect()
    }
}
