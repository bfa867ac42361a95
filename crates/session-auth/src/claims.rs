//! Identity-token claim decoding
//!
//! Reads the payload segment of a JWT without verifying its signature. The
//! token arrives straight from the provider's token endpoint, and the claims
//! are only used for display and expiry gating.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::bundle::UserInfo;
use crate::error::{Error, Result};

/// The claims this app reads. All optional: the payload is an external
/// contract and may omit any of them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IdClaims {
    /// Expiry, seconds since the unix epoch. Some providers send it as a float.
    pub exp: Option<f64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl IdClaims {
    /// Display profile; name falls back to email, then to empty.
    pub fn profile(&self) -> UserInfo {
        UserInfo {
            email: self.email.clone().unwrap_or_default(),
            name: self
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_default(),
            picture: self.picture.clone().unwrap_or_default(),
        }
        .with_name_fallback()
    }

    /// Whether `exp` lies before `now_millis`. A token without `exp` never expires.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        match self.exp {
            Some(exp) => exp * 1000.0 < now_millis as f64,
            None => false,
        }
    }
}

/// Decode the claims of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Result<IdClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::Claims("token has no payload segment".into()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::Claims(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| Error::Claims(format!("payload is not JSON: {e}")))
}
