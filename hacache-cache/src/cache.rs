//! Single-entry stale-while-revalidate cache.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use hacache_core::{CacheConfig, CacheError, CachePhase, CacheStats, Query, Result};

use crate::state::{Entry, RefreshState, Slot, State};

/// A refresh handed from a reader to the background refresher.
struct RefreshRequest<A> {
    arg: Option<A>,
}

/// Outcome of one pass through the read path.
enum Lookup<V, A> {
    /// A value is available (fresh or stale).
    Hit(V),
    /// Nothing loaded yet; the caller's argument is handed back for the retry.
    Pending(Option<A>),
}

struct Inner<A, Q>
where
    A: Send + 'static,
    Q: Query<A>,
{
    config: CacheConfig,
    query: Q,
    init_arg: Option<A>,
    state: Mutex<State<Q::Value>>,
    ready: watch::Sender<bool>,
}

/// Cache holding one expensive value.
///
/// The first load is retried until it succeeds and every reader waits for it.
/// After that, reads never wait: a stale read returns the current value and
/// asks the background refresher for a new one, at most one at a time.
///
/// Cloning is cheap and every clone shares the same value and refresher.
pub struct RefreshingCache<A, Q>
where
    A: Send + 'static,
    Q: Query<A>,
{
    inner: Arc<Inner<A, Q>>,
    refresh_tx: mpsc::Sender<RefreshRequest<A>>,
}

impl<A, Q> Clone for RefreshingCache<A, Q>
where
    A: Send + 'static,
    Q: Query<A>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            refresh_tx: self.refresh_tx.clone(),
        }
    }
}

impl<A, Q> RefreshingCache<A, Q>
where
    A: Clone + Send + Sync + 'static,
    Q: Query<A>,
{
    /// Creates a cache and starts loading its first value in the background.
    ///
    /// `init_arg` is passed to the first query and reused for refreshes
    /// triggered by readers that pass no argument of their own. Failed initial
    /// loads are retried every second.
    ///
    /// The TTL is kept at millisecond precision: a sub-millisecond remainder
    /// rounds up and anything past `u64::MAX` milliseconds saturates.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new(name: impl Into<String>, ttl: Duration, query: Q, init_arg: Option<A>) -> Self {
        Self::spawn(CacheConfig::named(name).with_ttl(ttl), query, init_arg)
    }

    /// Creates a cache from a validated configuration.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn with_config(config: CacheConfig, query: Q, init_arg: Option<A>) -> Result<Self> {
        config.validate()?;
        Ok(Self::spawn(config, query, init_arg))
    }

    fn spawn(config: CacheConfig, query: Q, init_arg: Option<A>) -> Self {
        // One slot: a request can only be pending while the state says InFlight.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (ready, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            config,
            query,
            init_arg,
            state: Mutex::new(State::new()),
            ready,
        });

        tokio::spawn(run(Arc::clone(&inner), refresh_rx));

        Self { inner, refresh_tx }
    }

    /// Returns the cached value.
    ///
    /// Waits only if the first load has not completed yet. A stale value is
    /// returned as is; if no refresh is running, one is started with `arg`
    /// (or the init argument when `arg` is `None`) and its result becomes
    /// visible to later reads.
    pub async fn get(&self, arg: Option<A>) -> Q::Value {
        let mut arg = arg;
        loop {
            match self.read(arg) {
                Lookup::Hit(value) => return value,
                Lookup::Pending(returned) => arg = returned,
            }
            self.wait_initialized().await;
        }
    }

    /// Returns the cached value without waiting, or `None` before the first load.
    ///
    /// Behaves like `get(None)` otherwise, including starting a refresh when stale.
    pub fn try_get(&self) -> Option<Q::Value> {
        match self.read(None) {
            Lookup::Hit(value) => Some(value),
            Lookup::Pending(_) => None,
        }
    }

    /// Waits until the first load has completed.
    pub async fn wait_initialized(&self) {
        let mut ready = self.inner.ready.subscribe();
        // The sender lives in `inner`, which `self` keeps alive, so this cannot fail.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Returns true once the first load has completed.
    pub fn is_initialized(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Current phase of the refresh state machine.
    pub fn phase(&self) -> CachePhase {
        self.inner.state.lock().phase(Instant::now())
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let state = self.inner.state.lock();
        let expires_in = match &state.slot {
            Slot::Uninitialized => Duration::ZERO,
            Slot::Ready(entry) => entry.expire_at.saturating_duration_since(now),
        };
        CacheStats {
            name: self.inner.config.name.clone(),
            phase: state.phase(now),
            init_attempts: state.init_attempts,
            refreshes: state.refreshes,
            refresh_failures: state.refresh_failures,
            expires_in_ms: u64::try_from(expires_in.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn read(&self, arg: Option<A>) -> Lookup<Q::Value, A> {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let entry = match &mut state.slot {
            Slot::Uninitialized => return Lookup::Pending(arg),
            Slot::Ready(entry) => entry,
        };

        if entry.is_fresh(now) || !entry.refresh.can_trigger(now) {
            return Lookup::Hit(entry.content.clone());
        }

        let request = RefreshRequest {
            arg: arg.or_else(|| self.inner.init_arg.clone()),
        };
        match self.refresh_tx.try_send(request) {
            Ok(()) => {
                entry.refresh = RefreshState::InFlight;
                debug!(cache = %self.inner.config.name, "Value stale, refresh requested");
            }
            Err(e) => {
                let err = CacheError::RefresherUnavailable(self.inner.config.name.clone());
                warn!(error = %err, reason = %e, "Refresh hand-off rejected, serving stale value");
            }
        }

        Lookup::Hit(entry.content.clone())
    }
}

/// Background task: first load, then serve refresh requests until every handle is gone.
async fn run<A, Q>(inner: Arc<Inner<A, Q>>, mut requests: mpsc::Receiver<RefreshRequest<A>>)
where
    A: Clone + Send + Sync + 'static,
    Q: Query<A>,
{
    inner.initialize().await;

    while let Some(request) = requests.recv().await {
        let outcome = inner.query.query(request.arg).await;
        inner.complete_refresh(outcome);
    }

    debug!(cache = %inner.config.name, "All handles dropped, refresher stopped");
}

impl<A, Q> Inner<A, Q>
where
    A: Clone + Send + Sync + 'static,
    Q: Query<A>,
{
    #[instrument(skip(self), fields(cache = %self.config.name))]
    async fn initialize(&self) {
        let delay = self.config.init_retry_delay();
        loop {
            let attempt = {
                let mut state = self.state.lock();
                state.init_attempts += 1;
                state.init_attempts
            };

            match self.query.query(self.init_arg.clone()).await {
                Ok(content) => {
                    self.state.lock().slot = Slot::Ready(Entry::new(content, self.config.ttl()));
                    self.ready.send_replace(true);
                    info!(attempt, "Initial load complete");
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, retry_in = ?delay, "Initial load failed");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn complete_refresh(&self, outcome: std::result::Result<Q::Value, Q::Error>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Slot::Ready(entry) = &mut state.slot else {
            return;
        };

        match outcome {
            Ok(content) => {
                entry.install(content, self.config.ttl());
                state.refreshes += 1;
                debug!(cache = %self.config.name, "Refreshed value installed");
            }
            Err(e) => {
                entry.refresh = RefreshState::after_failure(self.config.failure_policy, Instant::now());
                state.refresh_failures += 1;
                error!(
                    cache = %self.config.name,
                    error = %e,
                    policy = %self.config.failure_policy,
                    "Background refresh failed, keeping last good value"
                );
            }
        }
    }
}
