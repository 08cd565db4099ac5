//! Service-specific error types

use thiserror::Error;

/// Command-line usage errors. Runtime failures use `anyhow` in `main`.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("missing command")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument for {command}: {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("invalid {argument}: {value}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
