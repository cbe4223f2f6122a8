//! Command implementations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use rand::Rng;
use tracing::{info, warn};

use vector_bench::BenchmarkConfig;
use vector_manager::{
    CollectionManager, CollectionOptions, Readiness, ReadinessPoller, SearchClient, UploadOptions,
    UploadReport, Uploader,
};
use vector_store::{InMemoryStore, QdrantConfig, QdrantStore, VectorStore};
use vector_types::{Condition, Filter, Settings, VectorParams};

use crate::cli::{BenchArgs, Cli, CollectionCommands, Commands, LoadArgs, QueryArgs, SearchArgs};
use crate::records;

/// Load settings, set up logging and run the selected command.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    let store = connect(&settings, cli.dry_run)?;

    match cli.command {
        Commands::Load(args) => {
            let report = handle_load(store, &settings, &args).await?;
            println!(
                "mapped={} written={} skipped_existing={} mapping_failures={} batches={}",
                report.mapped,
                report.written,
                report.skipped_existing,
                report.mapping_failures,
                report.batches
            );
        }
        Commands::Collections { command } => handle_collections(store, command).await?,
        Commands::Search(args) => handle_search(store, &settings, &args).await?,
        Commands::Bench(args) => handle_bench(store, &settings, &args).await?,
        Commands::Wait { name, timeout } => {
            handle_wait(store, &name, Duration::from_secs(timeout)).await?
        }
    }

    Ok(())
}

/// Load layered settings and apply the global CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build the store client. Nothing is sent until the first call.
pub fn connect(settings: &Settings, dry_run: bool) -> Result<Arc<dyn VectorStore>> {
    if dry_run {
        warn!("Dry run: using an in-process store, nothing is persisted");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let config = QdrantConfig::from_settings(&settings.qdrant);
    info!(url = %config.url, "Connecting to Qdrant");
    let store = QdrantStore::new(config).context("Failed to create Qdrant client")?;
    Ok(Arc::new(store))
}

fn collection_name(arg: Option<&str>, settings: &Settings) -> Result<String> {
    let name = arg.unwrap_or(settings.qdrant.collection_name.as_str()).trim();
    ensure!(!name.is_empty(), "collection name cannot be empty");
    Ok(name.to_string())
}

/// Create the collection if needed, upload the JSONL file, report the count.
pub async fn handle_load(
    store: Arc<dyn VectorStore>,
    settings: &Settings,
    args: &LoadArgs,
) -> Result<UploadReport> {
    let collection = collection_name(args.collection.as_deref(), settings)?;
    ensure!(args.vector_size > 0, "vector size must be > 0");

    let mut upload = settings.upload.clone();
    if let Some(batch_size) = args.batch_size {
        upload.batch_size = batch_size;
    }
    if let Some(parallel) = args.parallel {
        upload.parallel = parallel;
    }
    if let Some(wait) = args.wait_timeout {
        upload.wait_timeout_secs = wait;
    }
    if args.no_check_existing {
        upload.check_existing = false;
    }
    ensure!(upload.batch_size > 0, "batch size must be > 0");
    ensure!(upload.parallel > 0, "parallel must be > 0");

    let replication_factor = args
        .replication_factor
        .unwrap_or(settings.qdrant.replication_factor);
    ensure!(replication_factor > 0, "replication factor must be > 0");

    let manager = CollectionManager::new(store.clone());
    let spaces = BTreeMap::from([(
        args.vector_name.clone(),
        VectorParams::new(args.vector_size, args.distance),
    )]);
    let options = CollectionOptions {
        use_quantization: !args.no_quantization,
        hnsw_m: args.hnsw_m,
        replication_factor,
        shard_number: args.shards,
    };
    manager.ensure(&collection, &spaces, &options).await?;

    let info = manager.info(&collection).await?;
    info!(
        collection = %collection,
        status = %info.status,
        points = info.points_count.unwrap_or(0),
        "Collection status before upload"
    );

    let lines = records::read_lines(&args.input)
        .await
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let report = Uploader::new(store.clone())
        .upload(
            &collection,
            lines,
            records::parse_point,
            &UploadOptions::from_settings(&upload),
        )
        .await
        .with_context(|| format!("Upload to '{}' failed", collection))?;

    if report.readiness == Some(Readiness::TimedOut) {
        warn!(collection = %collection, "Index still optimizing; searches may be slower until it finishes");
    }

    let count = SearchClient::new(store).count(&collection, None).await?;
    info!(collection = %collection, points = count, "Points in collection");

    Ok(report)
}

pub async fn handle_collections(
    store: Arc<dyn VectorStore>,
    command: CollectionCommands,
) -> Result<()> {
    let manager = CollectionManager::new(store);
    match command {
        CollectionCommands::List => {
            for name in manager.list().await? {
                println!("{}", name);
            }
        }
        CollectionCommands::Info { name } => {
            let info = manager.info(&name).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        CollectionCommands::Delete { name } => {
            manager.delete(&name).await;
        }
    }
    Ok(())
}

/// Query vector and filter resolved from the command line.
struct PreparedQuery {
    collection: String,
    vector_name: String,
    limit: usize,
    fixed: Option<Vec<f32>>,
    synthetic_dim: usize,
    filter: Option<Filter>,
}

impl PreparedQuery {
    fn new(args: &QueryArgs, settings: &Settings) -> Result<Self> {
        let collection = collection_name(args.collection.as_deref(), settings)?;
        ensure!(args.limit > 0, "limit must be > 0");

        let (fixed, synthetic_dim) = match args.synthetic {
            Some(dim) => {
                ensure!(dim > 0, "synthetic dimension must be > 0");
                (None, dim)
            }
            None => {
                ensure!(!args.vector.is_empty(), "query vector cannot be empty");
                (Some(args.vector.clone()), 0)
            }
        };

        Ok(Self {
            collection,
            vector_name: args.vector_name.clone(),
            limit: args.limit,
            fixed,
            synthetic_dim,
            filter: parse_filters(&args.filters)?,
        })
    }

    /// The fixed vector, or a fresh random one for synthetic queries.
    fn vector(&self) -> Vec<f32> {
        match &self.fixed {
            Some(v) => v.clone(),
            None => {
                let mut rng = rand::rng();
                (0..self.synthetic_dim).map(|_| rng.random::<f32>()).collect()
            }
        }
    }
}

/// Parse `KEY=VALUE` filters. Values that parse as JSON (numbers, booleans)
/// match typed fields; anything else matches as a string.
fn parse_filters(filters: &[String]) -> Result<Option<Filter>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let conditions = filters
        .iter()
        .map(|f| {
            let Some((key, value)) = f.split_once('=') else {
                bail!("filter '{}' must look like KEY=VALUE", f);
            };
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            Ok(Condition::matches_value(key.trim(), value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Filter::must(conditions)))
}

pub async fn handle_search(
    store: Arc<dyn VectorStore>,
    settings: &Settings,
    args: &SearchArgs,
) -> Result<()> {
    let query = PreparedQuery::new(&args.query, settings)?;
    let client = SearchClient::new(store);

    let results = if args.lean {
        client
            .search_lean(
                &query.collection,
                &query.vector_name,
                query.vector(),
                query.filter.clone(),
                query.limit,
            )
            .await?
    } else {
        client
            .search(
                &query.collection,
                &query.vector_name,
                query.vector(),
                query.filter.clone(),
                query.limit,
            )
            .await?
    };

    for hit in results {
        println!(
            "{}\t{:.4}\t{}",
            hit.id,
            hit.score,
            serde_json::Value::Object(hit.payload)
        );
    }
    Ok(())
}

pub async fn handle_bench(
    store: Arc<dyn VectorStore>,
    settings: &Settings,
    args: &BenchArgs,
) -> Result<()> {
    ensure!(args.runs > 0, "runs must be > 0");
    ensure!(args.concurrency > 0, "concurrency must be > 0");

    let query = PreparedQuery::new(&args.query, settings)?;
    let client = SearchClient::new(store);
    let config = BenchmarkConfig {
        total_runs: args.runs,
        warmup_runs: args.warmup,
        concurrency: args.concurrency,
        ..Default::default()
    };

    let result = vector_bench::run(&config, || {
        client.search(
            &query.collection,
            &query.vector_name,
            query.vector(),
            query.filter.clone(),
            query.limit,
        )
    })
    .await?;

    println!("{}", result.report);
    Ok(())
}

pub async fn handle_wait(store: Arc<dyn VectorStore>, name: &str, timeout: Duration) -> Result<()> {
    let poller = ReadinessPoller::new(store);
    let cancel = poller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping wait");
            cancel.cancel();
        }
    });

    match poller.wait_until_ready(name, timeout).await {
        Readiness::Ready => {
            println!("{} is ready", name);
            Ok(())
        }
        Readiness::TimedOut => bail!("'{}' not ready after {}s", name, timeout.as_secs()),
        Readiness::Cancelled => bail!("wait for '{}' cancelled", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;
    use vector_types::{Distance, Predicate};

    fn load_args(input: PathBuf) -> LoadArgs {
        LoadArgs {
            input,
            collection: Some("articles".to_string()),
            vector_name: "image".to_string(),
            vector_size: 2,
            distance: Distance::Dot,
            batch_size: Some(2),
            parallel: None,
            replication_factor: None,
            shards: None,
            hnsw_m: 16,
            no_check_existing: false,
            no_quantization: true,
            wait_timeout: Some(1),
        }
    }

    #[test]
    fn test_parse_filters() {
        assert!(parse_filters(&[]).unwrap().is_none());

        let filter = parse_filters(&["city=Berlin".to_string(), "year=2024".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(filter.must.len(), 2);
        assert_eq!(filter.must[0].key, "city");
        match &filter.must[1].predicate {
            Predicate::Match(m) => assert_eq!(m.value, json!(2024)),
            other => panic!("Expected match predicate, got {other:?}"),
        }

        assert!(parse_filters(&["nonsense".to_string()]).is_err());
    }

    #[test]
    fn test_collection_name_validation() {
        let settings = Settings::default();
        assert_eq!(
            collection_name(None, &settings).unwrap(),
            "articles_collection"
        );
        assert!(collection_name(Some("  "), &settings).is_err());
    }

    #[tokio::test]
    async fn test_load_into_in_memory_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id": 1, "vector": {{"image": [0.1, 0.1]}}, "payload": {{"city": "London"}}}}"#).unwrap();
        writeln!(file, "{{broken").unwrap();
        writeln!(file, r#"{{"id": 2, "vector": {{"image": [0.9, 0.9]}}, "payload": {{"city": "Berlin"}}}}"#).unwrap();

        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let settings = Settings::default();
        let args = load_args(file.path().to_path_buf());

        let report = handle_load(store.clone(), &settings, &args).await.unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.mapping_failures, 1);

        let report = handle_load(store.clone(), &settings, &args).await.unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped_existing, 2);

        let hits = SearchClient::new(store)
            .search("articles", "image", vec![0.9, 0.9], None, 1)
            .await
            .unwrap();
        assert_eq!(hits[0].id, 2);
    }

    #[tokio::test]
    async fn test_load_rejects_zero_batch_size() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let mut args = load_args(PathBuf::from("/nonexistent.jsonl"));
        args.batch_size = Some(0);

        assert!(handle_load(store, &Settings::default(), &args).await.is_err());
    }

    #[test]
    fn test_synthetic_query_vector() {
        let args = QueryArgs {
            collection: None,
            vector_name: "image".to_string(),
            limit: 3,
            vector: Vec::new(),
            synthetic: Some(8),
            filters: Vec::new(),
        };
        let query = PreparedQuery::new(&args, &Settings::default()).unwrap();
        let v = query.vector();
        assert_eq!(v.len(), 8);
        assert!(v.iter().all(|x| (0.0..1.0).contains(x)));
    }
}
