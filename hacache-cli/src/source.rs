//! Simulated data source for the demo.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use hacache_cache::Query;

/// Error returned by a simulated query.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("initial load attempt {0} rejected")]
    InitRejected(u64),
    #[error("refresh #{0} rejected")]
    RefreshRejected(u64),
}

/// A source that takes `latency` per call and returns an increasing version.
///
/// The first `init_failures` calls fail. After the first success, every
/// `fail_every`-th refresh fails (0 disables refresh failures).
pub struct SimulatedSource {
    calls: Arc<AtomicU64>,
    successes: AtomicU64,
    latency: Duration,
    init_failures: u64,
    fail_every: u64,
}

impl SimulatedSource {
    pub fn new(latency: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicU64::new(0)),
            successes: AtomicU64::new(0),
            latency,
            init_failures: 0,
            fail_every: 0,
        }
    }

    pub fn with_init_failures(mut self, count: u64) -> Self {
        self.init_failures = count;
        self
    }

    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = n;
        self
    }

    /// Shared counter of calls made so far.
    pub fn call_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.calls)
    }

    fn outcome(&self, call: u64) -> Result<u64, SourceError> {
        if call <= self.init_failures {
            return Err(SourceError::InitRejected(call));
        }
        let refresh = call - self.init_failures - 1;
        if refresh > 0 && self.fail_every > 0 && refresh % self.fail_every == 0 {
            return Err(SourceError::RefreshRejected(refresh));
        }
        Ok(self.successes.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Query<()> for SimulatedSource {
    type Value = u64;
    type Error = SourceError;

    async fn query(&self, _arg: Option<()>) -> Result<u64, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;
        let outcome = self.outcome(call);
        debug!(call, ok = outcome.is_ok(), "Simulated query finished");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_init_failures_then_versions() {
        let source = SimulatedSource::new(Duration::from_millis(10)).with_init_failures(2);
        assert!(matches!(source.query(None).await, Err(SourceError::InitRejected(1))));
        assert!(matches!(source.query(None).await, Err(SourceError::InitRejected(2))));
        assert_eq!(source.query(None).await.unwrap(), 1);
        assert_eq!(source.query(None).await.unwrap(), 2);
        assert_eq!(source.call_counter().load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_every_nth_refresh() {
        let source = SimulatedSource::new(Duration::ZERO).with_fail_every(2);
        assert_eq!(source.query(None).await.unwrap(), 1);
        assert_eq!(source.query(None).await.unwrap(), 2);
        assert!(matches!(source.query(None).await, Err(SourceError::RefreshRejected(2))));
        assert_eq!(source.query(None).await.unwrap(), 3);
    }
}
