//! User profile fields (timezone, display preferences, ...)

use std::collections::BTreeMap;

use session_auth::constants::API_PROFILE_PATH;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::{ApiError, Result};

/// Free-form profile: field name to value.
pub type Profile = BTreeMap<String, String>;

impl ApiClient {
    pub async fn get_profile(&self) -> Result<Profile> {
        let profile: Option<Profile> = self.get_json(API_PROFILE_PATH).await?;
        Ok(profile.unwrap_or_default())
    }

    /// Save the given fields; fields not listed are left as they are.
    pub async fn update_profile(&self, fields: &Profile) -> Result<()> {
        if fields.keys().any(|k| k.trim().is_empty()) {
            return Err(ApiError::Validation("profile field name is required".into()));
        }
        self.put_json(API_PROFILE_PATH, fields).await?;
        debug!(fields = fields.len(), "profile updated");
        Ok(())
    }

    pub async fn update_profile_field(&self, key: &str, value: &str) -> Result<()> {
        let fields = Profile::from([(key.to_string(), value.to_string())]);
        self.update_profile(&fields).await
    }
}
