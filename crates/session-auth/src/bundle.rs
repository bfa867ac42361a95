//! The credential bundle: what a signed-in browser profile remembers

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    ACCESS_TOKEN_KEY, API_KEY_ID_KEY, API_KEY_KEY, ID_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_INFO_KEY,
};
use crate::store::KeyValueStore;

/// Display profile of the signed-in user.
///
/// Persisted as JSON under `user_info` so identity survives identity-token
/// expiry once an API key exists. Every field defaults to empty because the
/// payload shape is owned by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

impl UserInfo {
    /// Use the email as display name when the name is blank.
    pub fn with_name_fallback(mut self) -> Self {
        if self.name.is_empty() {
            self.name = self.email.clone();
        }
        self
    }
}

/// Snapshot of every durable credential value.
///
/// Empty strings read as absent. `Debug` shows which values are present,
/// never the values themselves.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub api_key: Option<String>,
    pub api_key_id: Option<String>,
    pub user_info: Option<UserInfo>,
}

impl CredentialBundle {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let read = |key: &str| store.get(key).filter(|v| !v.is_empty());
        let user_info = read(USER_INFO_KEY).and_then(|raw| {
            serde_json::from_str::<UserInfo>(&raw)
                .inspect_err(|e| debug!(error = %e, "ignoring unparseable cached user info"))
                .ok()
        });

        Self {
            id_token: read(ID_TOKEN_KEY),
            access_token: read(ACCESS_TOKEN_KEY),
            refresh_token: read(REFRESH_TOKEN_KEY),
            api_key: read(API_KEY_KEY),
            api_key_id: read(API_KEY_ID_KEY),
            user_info,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("id_token", &self.id_token.is_some())
            .field("access_token", &self.access_token.is_some())
            .field("refresh_token", &self.refresh_token.is_some())
            .field("api_key", &self.api_key.is_some())
            .field("api_key_id", &self.api_key_id)
            .field("user_info", &self.user_info)
            .finish()
    }
}
