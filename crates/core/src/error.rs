//! Error types for JsonDB
//!
//! Every failure surfaced by the store (malformed JSON, invalid path keys,
//! SQL failures, unsupported dialect features) is reported through the single
//! [`Error`] enum. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.

use crate::key::KeyError;
use std::io;
use thiserror::Error;

/// Result type alias for JsonDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the JSON document store
#[derive(Debug, Error)]
pub enum Error {
    /// A path token or document field name failed validation
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Caller supplied input that is well-formed but not acceptable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed or truncated JSON input
    #[error("JSON parse error at byte {offset}: {message}")]
    Parse {
        /// Byte offset into the input where the error was detected
        offset: u64,
        /// What went wrong
        message: String,
    },

    /// Underlying SQL failure
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Operation not supported by the detected database dialect
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Stored rows cannot be turned back into JSON
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// I/O error while reading input or writing output
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an [`Error::InvalidInput`]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an [`Error::Corruption`]
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an [`Error::Unsupported`]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an [`Error::Parse`]
    pub fn parse(offset: u64, msg: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            message: msg.into(),
        }
    }
}
