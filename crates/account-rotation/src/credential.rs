//! Externally obtained credential used to seed an empty manager
//!
//! Only the refresh material is consumed, and only when no stored accounts
//! exist. Token refresh itself belongs to the authorization client.

use std::path::Path;

use common::Secret;
use serde::Deserialize;

/// OAuth credential handed in by the surrounding auth client.
///
/// `expires` is a unix timestamp in milliseconds for the access token.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackCredential {
    pub refresh: Secret<String>,
    #[serde(default)]
    pub access: Option<Secret<String>>,
    #[serde(default)]
    pub expires: u64,
}

impl FallbackCredential {
    pub fn new(refresh: impl Into<String>, expires: u64) -> Self {
        Self {
            refresh: Secret::new(refresh.into()),
            access: None,
            expires,
        }
    }

    /// Read a credential JSON file (`{"refresh": ..., "access": ..., "expires": ...}`).
    /// Unknown fields are ignored.
    pub fn from_file(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires <= now_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_file_reads_oauth_credential() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        std::fs::write(
            &path,
            r#"{"type":"oauth","refresh":"rt_file","access":"at_file","expires":1735500000000}"#,
        )
        .unwrap();

        let credential = FallbackCredential::from_file(&path).unwrap();
        assert_eq!(credential.refresh.expose(), "rt_file");
        assert_eq!(credential.access.as_ref().unwrap().expose(), "at_file");
        assert_eq!(credential.expires, 1_735_500_000_000);
    }

    #[test]
    fn from_file_missing_refresh_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");
        std::fs::write(&path, r#"{"access":"at_only"}"#).unwrap();

        let err = FallbackCredential::from_file(&path).unwrap_err();
        assert!(matches!(err, common::Error::Json(_)), "got: {err}");
    }

    #[test]
    fn from_file_missing_file_is_io_error() {
        let err = FallbackCredential::from_file(Path::new("/nonexistent/credential.json"))
            .unwrap_err();
        assert!(matches!(err, common::Error::Io(_)));
    }

    #[test]
    fn debug_never_shows_tokens() {
        let credential = FallbackCredential::new("rt_hidden", 0);
        let debug = format!("{credential:?}");
        assert!(!debug.contains("rt_hidden"), "got: {debug}");
    }

    #[test]
    fn expiry_check() {
        let credential = FallbackCredential::new("rt", 5_000);
        assert!(!credential.is_expired(4_999));
        assert!(credential.is_expired(5_000));
    }
}
