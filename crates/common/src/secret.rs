//! Redacting wrapper for bearer credentials (API keys, access tokens)

use std::fmt;
use zeroize::Zeroize;

const REDACTED: &str = "[REDACTED]";

/// A credential that never shows up in logs. Zeroed when dropped.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// The raw value. Only for putting it on the wire or in front of the user.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize + Default> Secret<T> {
    /// Take the raw value out; what is left behind is zeroed on drop.
    pub fn into_inner(mut self) -> T {
        std::mem::take(&mut self.0)
    }
}

impl Secret<String> {
    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_redacted_in_debug_and_display() {
        let secret = Secret::new(String::from("jl_live_abc123"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(
            format!("{:?}", Some(secret.clone())),
            "Some([REDACTED])"
        );
    }

    #[test]
    fn bearer_header_exposes_value() {
        let secret: Secret<String> = String::from("jl_live_abc123").into();
        assert_eq!(secret.expose(), "jl_live_abc123");
        assert_eq!(secret.bearer(), "Bearer jl_live_abc123");
    }

    #[test]
    fn into_inner_hands_back_value() {
        let secret = Secret::new(String::from("at_1"));
        assert_eq!(secret.into_inner(), "at_1");
    }
}
