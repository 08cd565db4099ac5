//! Error types for account store operations

/// Errors from persisting the account document.
///
/// Loading never fails (it degrades to "no prior state") and clearing is best
/// effort, so only `save` surfaces these.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
