//! Error types for session and login operations

/// Errors from session and login operations.
///
/// Public entry points that the rest of the app calls on every page
/// (`complete_login`, `current_user`, `logout`) swallow these after logging;
/// the lower-level functions return them so callers can decide.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("API key exchange failed: {0}")]
    KeyExchange(String),

    #[error("profile update failed: {0}")]
    Profile(String),

    #[error("invalid identity token: {0}")]
    Claims(String),

    #[error("no PKCE verifier for this callback (replayed or cross-session)")]
    MissingVerifier,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("stored value parse error: {0}")]
    StoreParse(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
