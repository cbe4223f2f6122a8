//! # vector-bench
//!
//! Measures the latency of an async call (typically a similarity search)
//! under a fixed concurrency limit and summarizes it with nearest-rank
//! percentiles.

pub mod error;
pub mod harness;
pub mod stats;

pub use error::BenchError;
pub use harness::{run, BenchmarkConfig, BenchmarkResult};
pub use stats::{nearest_rank, LatencyReport};
