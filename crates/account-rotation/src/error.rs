//! Error types for rotation operations

/// Errors from rotation manager operations.
///
/// Invariant violations never surface here: duplicates and out-of-range
/// indices are corrected in place.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("persisting account store: {0}")]
    Persist(#[from] account_store::Error),
}

/// Result alias for rotation operations.
pub type Result<T> = std::result::Result<T, Error>;
