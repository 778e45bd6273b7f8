//! Error types shared by the duofolio crates.

use thiserror::Error;

/// Result type alias for duofolio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the sync core and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote document store rejected a request or could not be reached.
    #[error("Remote store error: {0}")]
    Remote(String),

    /// The local key-value persistence layer failed.
    #[error("Local storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// User input rejected before it reached any store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid or missing runtime configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True when the failure came from the remote store and the caller may
    /// fall back to local-only operation.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
