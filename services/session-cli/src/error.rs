//! Service-specific error types

use thiserror::Error;

/// Failures of the local callback listener.
///
/// Login and API failures keep their own error types from `session-auth`
/// and `api-client`; these cover only what the CLI adds on top.
#[derive(Error, Debug)]
pub enum Error {
    #[error("callback listener failed: {0}")]
    Listener(String),

    #[error("no login callback within {0}s")]
    CallbackTimeout(u64),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
