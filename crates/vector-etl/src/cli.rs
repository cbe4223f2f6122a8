//! CLI argument parsing for vector-etl.
//!
//! CLI flags override all other configuration sources.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use vector_types::Distance;

/// Vector ETL
///
/// Load embeddings into a Qdrant collection, inspect collections, run
/// similarity searches and benchmark search latency.
#[derive(Parser, Debug)]
#[command(name = "vector-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/vector-etl/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Use an in-process store instead of Qdrant (nothing persists)
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the collection if needed and upload a JSONL file of points
    Load(LoadArgs),

    /// Collection management
    Collections {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// Run one similarity search
    Search(SearchArgs),

    /// Measure search latency
    Bench(BenchArgs),

    /// Wait until a collection's index is ready
    Wait {
        /// Collection name
        name: String,

        /// Seconds to wait before giving up
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CollectionCommands {
    /// List collection names
    List,

    /// Show a collection's configuration and status
    Info {
        /// Collection name
        name: String,
    },

    /// Delete a collection
    Delete {
        /// Collection name
        name: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// JSONL file, one `{"id", "vector", "payload"}` record per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Target collection (default from config)
    #[arg(long)]
    pub collection: Option<String>,

    /// Name of the vector space to create
    #[arg(long, default_value = "image")]
    pub vector_name: String,

    /// Dimension of the vector space
    #[arg(long, default_value_t = 1408)]
    pub vector_size: usize,

    /// Distance metric (cosine, euclid, dot, manhattan)
    #[arg(long, default_value = "cosine")]
    pub distance: Distance,

    /// Points per request (default from config)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Upsert requests in flight (default from config)
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Replicas per shard for a new collection (default from config)
    #[arg(long)]
    pub replication_factor: Option<u32>,

    /// Number of shards for a new collection (store default if unset)
    #[arg(long)]
    pub shards: Option<u32>,

    /// HNSW fan-out for a new collection
    #[arg(long, default_value_t = vector_types::DEFAULT_HNSW_M)]
    pub hnsw_m: usize,

    /// Upsert every record, even ids that already exist
    #[arg(long)]
    pub no_check_existing: bool,

    /// Keep vectors in RAM without quantization
    #[arg(long)]
    pub no_quantization: bool,

    /// Seconds to wait for the index after uploading (default from config)
    #[arg(long)]
    pub wait_timeout: Option<u64>,
}

/// Query selection shared by `search` and `bench`.
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("query").required(true).args(["vector", "synthetic"])))]
pub struct QueryArgs {
    /// Collection to query (default from config)
    #[arg(long)]
    pub collection: Option<String>,

    /// Vector space to search
    #[arg(long, default_value = "image")]
    pub vector_name: String,

    /// Number of results
    #[arg(long, default_value_t = 3)]
    pub limit: usize,

    /// Query vector as comma-separated floats
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub vector: Vec<f32>,

    /// Use a random query vector of this dimension
    #[arg(long)]
    pub synthetic: Option<usize>,

    /// Exact-match payload filter KEY=VALUE (repeatable, all must match)
    #[arg(long = "filter")]
    pub filters: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Return ids and scores only
    #[arg(long)]
    pub lean: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Measured searches
    #[arg(long, default_value_t = 100)]
    pub runs: usize,

    /// Unmeasured searches before the run
    #[arg(long, default_value_t = 3)]
    pub warmup: usize,

    /// Searches in flight at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}
