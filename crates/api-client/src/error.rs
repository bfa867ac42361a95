//! API call errors

/// Why an API call failed. The user has already been notified by the time
/// a caller sees one of these.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 401; the session has been cleared
    #[error("session expired")]
    Unauthorized,

    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    /// Rejected locally, nothing was sent
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid URL: {0}")]
    Url(String),
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;
