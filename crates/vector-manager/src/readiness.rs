//! Polls a collection until its index reports green.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vector_store::VectorStore;
use vector_types::CollectionStatus;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of waiting for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Index reported green
    Ready,
    /// Timeout elapsed first; a warning has been logged
    TimedOut,
    /// The cancellation token fired
    Cancelled,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        *self == Readiness::Ready
    }
}

/// Waits for index optimization to finish.
pub struct ReadinessPoller {
    store: Arc<dyn VectorStore>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl ReadinessPoller {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Stop waiting as soon as `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that interrupts any wait in progress.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll until the collection is green, `timeout` elapses, or the wait is
    /// cancelled. Never fails: status check errors are logged and polling
    /// continues. The deadline and cancellation also interrupt a status check
    /// that is still in flight.
    pub async fn wait_until_ready(&self, collection: &str, timeout: Duration) -> Readiness {
        let started = Instant::now();
        let mut last_status = None;

        let readiness = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Readiness::Cancelled,
            polled = timeout_at(started + timeout, self.poll(collection, started, &mut last_status)) => {
                match polled {
                    Ok(()) => Readiness::Ready,
                    Err(_) => Readiness::TimedOut,
                }
            }
        };

        match readiness {
            Readiness::Ready => info!(
                collection,
                waited_ms = started.elapsed().as_millis(),
                "Collection ready"
            ),
            Readiness::TimedOut => warn!(
                collection,
                timeout_secs = timeout.as_secs(),
                last_status = %last_status.map_or_else(|| "unavailable".to_string(), |s: CollectionStatus| s.to_string()),
                "Collection not ready before timeout"
            ),
            Readiness::Cancelled => info!(collection, "Stopped waiting for collection"),
        }
        readiness
    }

    /// Check now, then on every tick, until the collection is green.
    async fn poll(
        &self,
        collection: &str,
        started: Instant,
        last_status: &mut Option<CollectionStatus>,
    ) {
        if self.check(collection, last_status).await {
            return;
        }

        let mut ticker = interval_at(started + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.check(collection, last_status).await {
                return;
            }
        }
    }

    async fn check(&self, collection: &str, last_status: &mut Option<CollectionStatus>) -> bool {
        match self.store.get_collection(collection).await {
            Ok(info) => {
                debug!(collection, status = %info.status, "Collection status");
                *last_status = Some(info.status);
                info.status.is_ready()
            }
            Err(e) => {
                warn!(collection, error = %e, "Failed to check collection status");
                false
            }
        }
    }
}
