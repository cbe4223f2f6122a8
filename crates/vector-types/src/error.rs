//! Error types shared across vector-etl crates.

use thiserror::Error;

/// Errors raised while building or loading shared types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognized distance metric name
    #[error("Unknown distance metric: {0}")]
    InvalidDistance(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
