//! On-disk account document
//!
//! Load is lenient: a missing, malformed, or wrong-version file yields `None`
//! ("no prior state") and never an error, so rotation can keep running from a
//! fallback credential. Save is strict and atomic (temp file + rename). A
//! tokio Mutex serializes writers so concurrent saves cannot interleave.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::account::{Account, AccountDocument, DOCUMENT_VERSION, non_negative_u64};
use crate::dedup::dedupe;
use crate::error::{Error, Result};

/// Directory under the user's home that holds the store.
const STORE_DIR: &str = ".config/account-rotation";

/// File name of the account document.
const STORE_FILE: &str = "accounts.json";

/// Distinguishes temp files of concurrent saves within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Per-user location of the account document, if a home directory is known.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(STORE_DIR).join(STORE_FILE))
}

/// Why a readable file was not accepted as prior state.
#[derive(Debug, PartialEq)]
pub(crate) enum Rejection {
    Malformed(String),
    UnsupportedVersion(Value),
    NoValidAccounts,
}

/// File-backed account document.
///
/// Holds no copy of the document: every load returns a fresh snapshot and
/// every save writes the snapshot it is handed.
pub struct AccountStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AccountStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, validate, and deduplicate the stored document.
    ///
    /// Returns `None` when the file is absent, unreadable, malformed, carries
    /// an unsupported version, or holds no usable accounts.
    pub async fn load(&self) -> Option<AccountDocument> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "account store not found, no prior state");
                return None;
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read account store");
                return None;
            }
        };

        match parse_document(&contents) {
            Ok(document) => {
                info!(
                    path = %self.path.display(),
                    accounts = document.accounts.len(),
                    active_index = document.active_index,
                    "loaded account store"
                );
                Some(document)
            }
            Err(Rejection::Malformed(reason)) => {
                warn!(path = %self.path.display(), reason = %reason, "malformed account store, ignoring");
                None
            }
            Err(Rejection::UnsupportedVersion(found)) => {
                warn!(
                    path = %self.path.display(),
                    version = %found,
                    expected = DOCUMENT_VERSION,
                    "unsupported account store version, ignoring"
                );
                None
            }
            Err(Rejection::NoValidAccounts) => {
                debug!(path = %self.path.display(), "account store holds no usable accounts");
                None
            }
        }
    }

    /// Persist a full snapshot of the document.
    ///
    /// Creates missing parent directories, then replaces the file atomically.
    pub async fn save(&self, document: &AccountDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, document).await
    }

    /// Delete the backing file.
    ///
    /// Best effort: an absent file counts as cleared and other I/O failures are
    /// logged, not returned. Returns whether a file was actually removed.
    pub async fn clear(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "cleared account store");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "account store already absent");
                false
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to clear account store");
                false
            }
        }
    }
}

/// Validate raw file contents into a document.
///
/// Order: shape, version, per-record refresh token filter, dedup, index clamp.
pub(crate) fn parse_document(contents: &str) -> std::result::Result<AccountDocument, Rejection> {
    let value: Value =
        serde_json::from_str(contents).map_err(|e| Rejection::Malformed(e.to_string()))?;

    let Value::Object(object) = value else {
        return Err(Rejection::Malformed("document is not an object".into()));
    };

    let Some(Value::Array(raw_accounts)) = object.get("accounts") else {
        return Err(Rejection::Malformed("accounts is not a list".into()));
    };

    if let Some(version) = object.get("version") {
        if version.as_f64() != Some(f64::from(DOCUMENT_VERSION)) {
            return Err(Rejection::UnsupportedVersion(version.clone()));
        }
    }

    let accounts: Vec<Account> = raw_accounts
        .iter()
        .filter(|raw| {
            raw.get("refreshToken")
                .and_then(Value::as_str)
                .is_some_and(|token| !token.is_empty())
        })
        .filter_map(|raw| match serde_json::from_value(raw.clone()) {
            Ok(account) => Some(account),
            Err(e) => {
                debug!(error = %e, "dropping unreadable account record");
                None
            }
        })
        .collect();

    let accounts = dedupe(accounts);
    if accounts.is_empty() {
        return Err(Rejection::NoValidAccounts);
    }

    let active_index = object
        .get("activeIndex")
        .and_then(non_negative_u64)
        .map_or(0, |index| usize::try_from(index).unwrap_or(usize::MAX));

    Ok(AccountDocument::new(accounts, active_index))
}

/// Write the document to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 since the file holds refresh
/// tokens.
async fn write_atomic(path: &Path, document: &AccountDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document)
        .map_err(|e| Error::Serialize(format!("serializing account store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("account store path has no parent directory".into()))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating account store directory: {e}")))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| STORE_FILE.to_string());
    let tmp_path = dir.join(format!(
        ".{file_name}.tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp account store: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting account store permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp account store: {e}")))?;

    debug!(
        path = %path.display(),
        accounts = document.accounts.len(),
        "persisted account store"
    );
    Ok(())
}
