//! Benchmark error types.

use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Invalid benchmark configuration: {0}")]
    InvalidConfig(String),

    /// A measured or warmup call failed
    #[error("Benchmark call failed: {0}")]
    Call(Box<dyn StdError + Send + Sync>),
}
