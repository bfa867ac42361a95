//! User-facing notices raised by failed API calls
//!
//! A `NoticeSink` is where a toast would appear in a browser. Only one
//! notice is meant to be visible at a time; sinks replace the previous one.

use std::fmt;
use std::time::Duration;

use tracing::warn;

/// How long after a session-expired notice the app should reload.
pub const RELOAD_DELAY: Duration = Duration::from_millis(1500);

/// How long a notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// HTTP 401: credentials were cleared, reload into the login flow
    SessionExpired { reload_after: Duration },
    /// Any other non-success response
    RequestFailed(String),
    /// No response at all
    NetworkUnreachable,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SessionExpired { .. } => write!(f, "Session expired. Please sign in again."),
            Notice::RequestFailed(message) => write!(f, "Request failed: {message}"),
            Notice::NetworkUnreachable => write!(f, "Network error. Check your connection."),
        }
    }
}

pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NoticeSink for LogSink {
    fn notify(&self, notice: Notice) {
        warn!(notice = %notice, "api notice");
    }
}
