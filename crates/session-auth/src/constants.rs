//! Storage keys, endpoint paths and protocol defaults
//!
//! The storage keys are the on-disk format of a signed-in user's credential
//! bundle. Renaming any of them signs every existing user out.

/// Identity token issued by the provider (display claims, `exp`)
pub const ID_TOKEN_KEY: &str = "id_token";

/// Provider access token, only used to obtain an API key
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Provider refresh token (stored, never used for renewal)
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Long-lived API key; the primary bearer credential once present
pub const API_KEY_KEY: &str = "api_key";

/// Identifier of the API key issued to this client
pub const API_KEY_ID_KEY: &str = "api_key_id";

/// Cached `UserInfo` JSON, trusted only alongside an API key
pub const USER_INFO_KEY: &str = "user_info";

/// Every durable key of the credential bundle, cleared together.
pub const BUNDLE_KEYS: [&str; 6] = [
    ID_TOKEN_KEY,
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    API_KEY_KEY,
    API_KEY_ID_KEY,
    USER_INFO_KEY,
];

/// Session-scoped key holding the PKCE verifier between redirect and callback
pub const PKCE_VERIFIER_KEY: &str = "pkce_code_verifier";

/// Random bytes behind each PKCE verifier (hex-encoded to 128 characters)
pub const VERIFIER_BYTES: usize = 64;

/// Scopes requested at the authorization endpoint
pub const DEFAULT_SCOPES: &str = "openid email profile";

/// Fixed path the provider redirects back to
pub const CALLBACK_PATH: &str = "/auth/callback/";

/// Label attached to API keys issued during login
pub const DEFAULT_KEY_LABEL: &str = "Web UI";

pub const AUTHORIZE_PATH: &str = "/oauth2/authorize";
pub const TOKEN_PATH: &str = "/oauth2/token";
pub const LOGOUT_PATH: &str = "/logout";

pub const API_TOKEN_PATH: &str = "/api/token";
pub const API_SESSION_PATH: &str = "/api/auth/session";
pub const API_PROFILE_PATH: &str = "/api/profile";
