//! Credential wrapper that refuses to print itself.

use std::fmt;

/// A secret string such as an access token or an authenticated URL.
///
/// `Debug` and `Display` always print `[REDACTED]`, so a secret can sit in
/// a struct that derives `Debug` or flow into a `tracing` field without
/// leaking. Call [`SecretString::expose`] only at the point of use.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Creates a new secret string.
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Exposes the secret value.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Returns whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::new("glpat-abcdef");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(secret.expose(), "glpat-abcdef");
    }

    #[test]
    fn test_secret_inside_debug_struct() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Holder {
            token: SecretString,
        }

        let holder = Holder {
            token: "ghp_secret".into(),
        };
        assert!(!format!("{holder:?}").contains("ghp_secret"));
    }
}
