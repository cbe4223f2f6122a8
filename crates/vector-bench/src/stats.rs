//! Latency summary statistics.

use std::fmt;
use std::time::Duration;

/// Summary of a set of latency samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyReport {
    pub count: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencyReport {
    /// Summarize `samples`. Returns `None` when there are none.
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let total: Duration = sorted.iter().sum();

        Some(Self {
            count: sorted.len(),
            mean: total / sorted.len() as u32,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p50: nearest_rank(&sorted, 50.0),
            p95: nearest_rank(&sorted, 95.0),
            p99: nearest_rank(&sorted, 99.0),
        })
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs={} mean={:.2}ms min={:.2}ms max={:.2}ms p50={:.2}ms p95={:.2}ms p99={:.2}ms",
            self.count,
            millis(self.mean),
            millis(self.min),
            millis(self.max),
            millis(self.p50),
            millis(self.p95),
            millis(self.p99),
        )
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Nearest-rank percentile of an ascending sample.
///
/// `rank = ceil(p / 100 * n)`, clamped to `1..=n`; the value is the sample at
/// that rank. Always returns an observed value, never an interpolation.
pub fn nearest_rank<T: Copy + Default>(sorted: &[T], p: f64) -> T {
    let n = sorted.len();
    if n == 0 {
        return T::default();
    }
    let rank = (p * n as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_rank_one_to_hundred() {
        let values: Vec<u32> = (1..=100).collect();
        assert_eq!(nearest_rank(&values, 50.0), 50);
        assert_eq!(nearest_rank(&values, 95.0), 95);
        assert_eq!(nearest_rank(&values, 99.0), 99);
        assert_eq!(nearest_rank(&values, 100.0), 100);
        assert_eq!(nearest_rank(&values, 0.0), 1);
    }

    #[test]
    fn test_nearest_rank_small_sample() {
        let values = [10u32, 20, 30];
        assert_eq!(nearest_rank(&values, 50.0), 20);
        assert_eq!(nearest_rank(&values, 95.0), 30);
        assert_eq!(nearest_rank(&[7u32], 99.0), 7);
    }

    #[test]
    fn test_report() {
        let samples: Vec<Duration> = (1..=100).rev().map(Duration::from_millis).collect();
        let report = LatencyReport::from_samples(&samples).unwrap();

        assert_eq!(report.count, 100);
        assert_eq!(report.min, Duration::from_millis(1));
        assert_eq!(report.max, Duration::from_millis(100));
        assert_eq!(report.mean, Duration::from_micros(50_500));
        assert_eq!(report.p50, Duration::from_millis(50));
        assert_eq!(report.p95, Duration::from_millis(95));
        assert_eq!(report.p99, Duration::from_millis(99));
        assert!(report.to_string().starts_with("runs=100 mean=50.50ms"));
    }

    #[test]
    fn test_empty_report() {
        assert!(LatencyReport::from_samples(&[]).is_none());
    }
}
