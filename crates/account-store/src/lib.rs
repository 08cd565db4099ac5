//! Persistent account store for credential rotation
//!
//! Owns the on-disk representation of the rotation state: a versioned JSON
//! document listing every known account and which one is active. Reads are
//! lenient (anything malformed degrades to "no prior state"), writes are
//! strict (failures are returned to the caller) and atomic.
//!
//! Document flow:
//! 1. `AccountStore::load()` → validated, deduplicated `AccountDocument` or `None`
//! 2. Rotation manager mutates its in-memory copy
//! 3. `AccountStore::save()` persists a snapshot via temp file + rename
//! 4. `AccountStore::clear()` removes the file entirely

pub mod account;
pub mod dedup;
pub mod error;
pub mod store;

pub use account::{Account, AccountDocument, CooldownReason, DOCUMENT_VERSION, SwitchReason};
pub use dedup::{clamp_index, dedupe};
pub use error::{Error, Result};
pub use store::{AccountStore, default_path};
