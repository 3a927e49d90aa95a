//! Common error types for the code duel services

use thiserror::Error;

/// Common result type for duel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the duel services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A result payload lacks the fields the Similarity Engine needs
    #[error("Invalid scoring input: {0}")]
    ScoringInput(String),
}
