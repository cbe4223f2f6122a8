//! vector-etl library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (load, collections, search, bench, wait)
//! - `records`: JSONL point source

pub mod cli;
pub mod commands;
pub mod records;

pub use cli::{BenchArgs, Cli, CollectionCommands, Commands, LoadArgs, QueryArgs, SearchArgs};
pub use commands::{
    connect, handle_bench, handle_collections, handle_load, handle_search, handle_wait,
    load_settings, run,
};
