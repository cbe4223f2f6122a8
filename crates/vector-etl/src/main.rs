//! Vector ETL
//!
//! Loads embeddings into a Qdrant collection and searches them.
//!
//! # Usage
//!
//! ```bash
//! vector-etl load --input points.jsonl [--collection NAME] [--vector-size 1408]
//! vector-etl collections list | info NAME | delete NAME
//! vector-etl search --vector 0.1,0.2,... [--limit 3]
//! vector-etl bench --synthetic 1408 [--runs 100] [--concurrency 10]
//! vector-etl wait NAME [--timeout 300]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/vector-etl/config.toml)
//! 3. Environment variables (VECTOR_ETL_*, plus QDRANT_API_KEY / QDRANT_CA_CERT)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use vector_etl::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}
