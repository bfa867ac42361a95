//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the
//! authorization redirect. The verifier stays in session-scoped storage and
//! is sent during token exchange; the challenge goes into the authorization
//! URL so the provider can bind the code to this client.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::AuthConfig;
use crate::constants::VERIFIER_BYTES;
use crate::error::{Error, Result};

/// A verifier and the challenge derived from it. Never reused across logins.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes, hex-encoded to 128 characters (the RFC 7636 maximum).
/// The thread RNG is seeded from the OS; if the OS source is unavailable it
/// panics rather than falling back to a weaker generator.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`, unpadded.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the provider authorization URL.
///
/// `challenge` is `None` for the brokered strategy, which sends no PKCE
/// parameters at all.
pub fn build_authorization_url(config: &AuthConfig, challenge: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(&config.authorize_endpoint())
        .map_err(|e| Error::InvalidConfig(format!("provider_url: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &config.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", &config.scopes)
            .append_pair("redirect_uri", &config.redirect_uri());
        if let Some(challenge) = challenge {
            query
                .append_pair("code_challenge_method", "S256")
                .append_pair("code_challenge", challenge);
        }
        if let Some(idp) = &config.identity_provider {
            query.append_pair("identity_provider", idp);
        }
    }
    Ok(url)
}
