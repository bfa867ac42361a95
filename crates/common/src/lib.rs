//! Types shared by the session workspace: a redacting wrapper for bearer
//! credentials and the configuration error type.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
