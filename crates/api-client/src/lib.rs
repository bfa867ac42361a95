//! Authenticated client for the internal API
//!
//! Every request goes through [`ApiClient`], which attaches the session's
//! bearer credential and turns failures into [`Notice`]s for the user:
//! a 401 clears the session and asks for a fresh sign-in, transport errors
//! ask the user to check their connection, anything else reports the
//! server's message. Callers still get an [`ApiError`] and decide what to
//! render.
//!
//! On top of the client sit the API-key management and profile calls.

pub mod client;
pub mod error;
pub mod keys;
pub mod notice;
pub mod profile;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::ApiClient;
pub use error::{ApiError, Result};
pub use keys::{ApiKeyInfo, KeyRow, Revoked};
pub use notice::{LogSink, Notice, NoticeSink};
pub use profile::Profile;
