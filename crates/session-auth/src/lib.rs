//! Browser-style OAuth session library
//!
//! Provides PKCE generation, the authorization redirect, callback handling,
//! session resolution and API-key exchange for a hosted identity provider.
//! Pages (or the CLI) never talk to the provider directly; they ask
//! [`Session`] who is signed in and which bearer credential to send.
//!
//! Credential flow:
//! 1. `LoginFlow::begin_login()` stores a PKCE verifier and returns the authorize URL
//! 2. The provider redirects back to `{origin}/auth/callback/?code=...`
//! 3. `LoginFlow::complete_login()` consumes the verifier and exchanges the code
//! 4. Tokens and cached profile land in the durable [`KeyValueStore`]
//! 5. `LoginFlow::ensure_api_key()` trades the access token for a long-lived API key
//! 6. `Session::access_credential()` hands the API key (or access token) to API calls
//! 7. `LoginFlow::logout()` clears everything and returns the provider logout URL

pub mod bundle;
pub mod claims;
pub mod config;
pub mod constants;
pub mod error;
pub mod login;
pub mod pkce;
pub mod session;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use bundle::{CredentialBundle, UserInfo};
pub use claims::{IdClaims, decode_claims};
pub use config::{AuthConfig, SessionStrategy, local_timezone};
pub use error::{Error, Result};
pub use login::{KeyExchange, LoginFlow};
pub use pkce::{PkceChallenge, build_authorization_url, compute_challenge, generate_verifier};
pub use session::Session;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token::{
    BrokeredSession, IssuedKey, TokenResponse, exchange_code, exchange_code_brokered, issue_api_key,
};
