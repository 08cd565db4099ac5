//! Secret wrapper for credential material
//!
//! Refresh tokens must never reach logs in clear text. `Secret` redacts itself
//! in `Debug`/`Display` and zeroizes on drop; `fingerprint` gives a stable,
//! non-reversible handle so log lines about the same credential can still be
//! correlated.

use std::fmt;

use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Number of hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 12;

/// Short SHA-256 fingerprint of a secret value, safe to log.
pub fn fingerprint(value: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(value.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize + AsRef<str>> Secret<T> {
    /// Log-safe fingerprint of the wrapped value.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.0.as_ref())
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
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

impl<'de, T: Zeroize + Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Secret::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_redacts_debug_and_display() {
        let secret = Secret::new(String::from("rt_live_abc"));
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(secret.to_string(), "[REDACTED]");
    }

    #[test]
    fn secret_exposes_value() {
        let secret = Secret::new(String::from("rt_live_abc"));
        assert_eq!(secret.expose(), "rt_live_abc");
    }

    #[test]
    fn fingerprint_is_short_stable_and_hides_input() {
        let a = fingerprint("rt_live_abc");
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_eq!(a, fingerprint("rt_live_abc"));
        assert_ne!(a, fingerprint("rt_live_abd"));
        assert!(!a.contains("rt_live"));
    }

    #[test]
    fn secret_fingerprint_matches_free_function() {
        let secret = Secret::new(String::from("rt_live_abc"));
        assert_eq!(secret.fingerprint(), fingerprint("rt_live_abc"));
    }

    #[test]
    fn secret_deserializes_from_plain_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            refresh: Secret<String>,
        }
        let w: Wrapper = serde_json::from_str(r#"{"refresh":"rt_json"}"#).unwrap();
        assert_eq!(w.refresh.expose(), "rt_json");
    }
}
