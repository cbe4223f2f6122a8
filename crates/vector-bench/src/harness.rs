//! Benchmark runner.

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, TryStreamExt};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::BenchError;
use crate::stats::LatencyReport;

/// How many calls to make and how many may overlap.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Measured calls
    pub total_runs: usize,

    /// Serial calls before measuring; results discarded
    pub warmup_runs: usize,

    /// Calls in flight at once
    pub concurrency: usize,

    /// Log progress every this many completions
    pub progress_every: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            total_runs: 100,
            warmup_runs: 3,
            concurrency: 1,
            progress_every: 10,
        }
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.total_runs == 0 {
            return Err(BenchError::InvalidConfig(
                "total_runs must be >= 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Samples and their summary.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Latencies in completion order
    pub samples: Vec<Duration>,
    pub report: LatencyReport,
}

/// Time `search_fn` under bounded concurrency.
///
/// Each measured call first takes a permit from a semaphore of size
/// `concurrency`; its latency runs from permit acquisition to completion.
/// The first failing call aborts the run.
pub async fn run<F, Fut, T, E>(
    config: &BenchmarkConfig,
    search_fn: F,
) -> Result<BenchmarkResult, BenchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    config.validate()?;

    for run in 0..config.warmup_runs {
        search_fn().await.map_err(|e| BenchError::Call(e.into()))?;
        debug!(run, "Warmup call finished");
    }

    info!(
        runs = config.total_runs,
        concurrency = config.concurrency,
        "Starting benchmark"
    );

    let semaphore = Semaphore::new(config.concurrency);
    let semaphore = &semaphore;
    let search_fn = &search_fn;

    let calls: FuturesUnordered<_> = (0..config.total_runs)
        .map(|_| async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| BenchError::Call(Box::new(e)))?;
            let start = Instant::now();
            search_fn().await.map_err(|e| BenchError::Call(e.into()))?;
            Ok::<_, BenchError>(start.elapsed())
        })
        .collect();

    let progress_every = config.progress_every.max(1);
    let total = config.total_runs;
    let samples = calls
        .try_fold(Vec::with_capacity(total), |mut samples, latency| async move {
            samples.push(latency);
            if samples.len() % progress_every == 0 {
                info!(completed = samples.len(), total, "Benchmark progress");
            }
            Ok::<_, BenchError>(samples)
        })
        .await?;

    let report = LatencyReport::from_samples(&samples).ok_or_else(|| {
        BenchError::InvalidConfig("benchmark produced no samples".to_string())
    })?;
    info!(%report, "Benchmark finished");

    Ok(BenchmarkResult { samples, report })
}
