//! Error types for assetvault.

use thiserror::Error;

/// Result type alias using assetvault's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for assetvault operations.
///
/// A missing source record at the start of an archive or restore is not an
/// error; those operations return `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected because of existing state (duplicate key, blocked archive)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The explicit-key insert mode of a table could not be released.
    ///
    /// Leaving the mode enabled is a configuration bug, so this is never
    /// retried or downgraded.
    #[error("Identity insert toggle on {table} could not be released: {message}")]
    IdentityToggle { table: String, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
