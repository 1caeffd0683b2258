//! Lock-protected state of a refreshing cache.

use std::time::Duration;

use tokio::time::Instant;

use hacache_core::{CachePhase, RefreshFailurePolicy};

/// Stand-in for "never" when a deadline does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + after`, clamped to roughly 30 years out instead of overflowing.
fn deadline(now: Instant, after: Duration) -> Instant {
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Background refresh progress for an initialized cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RefreshState {
    /// No refresh running; a stale read may start one.
    Idle,
    /// A request has been handed to the refresher and has not finished.
    InFlight,
    /// The last refresh failed; stale reads may start another once `until` passes.
    BackingOff { until: Instant },
    /// The last refresh failed and the policy forbids any further attempt.
    Frozen,
}

impl RefreshState {
    /// Whether a stale read at `now` should hand off a new refresh request.
    pub(crate) fn can_trigger(&self, now: Instant) -> bool {
        match self {
            RefreshState::Idle => true,
            RefreshState::BackingOff { until } => now >= *until,
            RefreshState::InFlight | RefreshState::Frozen => false,
        }
    }

    /// State to settle in after a failed refresh at `now`.
    pub(crate) fn after_failure(policy: RefreshFailurePolicy, now: Instant) -> Self {
        match policy.backoff() {
            Some(backoff) if backoff.is_zero() => RefreshState::Idle,
            Some(backoff) => RefreshState::BackingOff { until: deadline(now, backoff) },
            None => RefreshState::Frozen,
        }
    }
}

/// A loaded value and its freshness bookkeeping.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    pub(crate) content: V,
    pub(crate) expire_at: Instant,
    pub(crate) refresh: RefreshState,
}

impl<V> Entry<V> {
    pub(crate) fn new(content: V, ttl: Duration) -> Self {
        Self {
            content,
            expire_at: deadline(Instant::now(), ttl),
            refresh: RefreshState::Idle,
        }
    }

    pub(crate) fn is_fresh(&self, now: Instant) -> bool {
        now < self.expire_at
    }

    /// Installs a successfully fetched value and reopens the refresh trigger.
    pub(crate) fn install(&mut self, content: V, ttl: Duration) {
        let expire_at = deadline(Instant::now(), ttl);
        self.content = content;
        // Instants are monotonic, so this only moves forward.
        self.expire_at = self.expire_at.max(expire_at);
        self.refresh = RefreshState::Idle;
    }

    pub(crate) fn phase(&self, now: Instant) -> CachePhase {
        if self.is_fresh(now) {
            return CachePhase::Fresh;
        }
        match self.refresh {
            RefreshState::Idle => CachePhase::Stale,
            RefreshState::InFlight => CachePhase::Refreshing,
            RefreshState::BackingOff { until } if now < until => CachePhase::BackingOff,
            RefreshState::BackingOff { .. } => CachePhase::Stale,
            RefreshState::Frozen => CachePhase::Frozen,
        }
    }
}

/// Whether the first load has landed.
#[derive(Debug)]
pub(crate) enum Slot<V> {
    Uninitialized,
    Ready(Entry<V>),
}

/// Everything guarded by the cache lock.
#[derive(Debug)]
pub(crate) struct State<V> {
    pub(crate) slot: Slot<V>,
    pub(crate) init_attempts: u64,
    pub(crate) refreshes: u64,
    pub(crate) refresh_failures: u64,
}

impl<V> State<V> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Slot::Uninitialized,
            init_attempts: 0,
            refreshes: 0,
            refresh_failures: 0,
        }
    }

    pub(crate) fn phase(&self, now: Instant) -> CachePhase {
        match &self.slot {
            Slot::Uninitialized => CachePhase::Uninitialized,
            Slot::Ready(entry) => entry.phase(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_entry_goes_stale_after_ttl() {
        let entry = Entry::new("v1", TTL);
        assert_eq!(entry.phase(Instant::now()), CachePhase::Fresh);

        tokio::time::advance(TTL).await;
        assert!(!entry.is_fresh(Instant::now()));
        assert_eq!(entry.phase(Instant::now()), CachePhase::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_extends_expiry_and_clears_refresh() {
        let mut entry = Entry::new("v1", TTL);
        let first_expiry = entry.expire_at;

        tokio::time::advance(Duration::from_millis(150)).await;
        entry.refresh = RefreshState::InFlight;
        assert_eq!(entry.phase(Instant::now()), CachePhase::Refreshing);

        entry.install("v2", TTL);
        assert_eq!(entry.content, "v2");
        assert!(entry.expire_at > first_expiry);
        assert_eq!(entry.refresh, RefreshState::Idle);
        assert_eq!(entry.phase(Instant::now()), CachePhase::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_transitions() {
        let now = Instant::now();

        let idle = RefreshState::after_failure(RefreshFailurePolicy::retry(), now);
        assert_eq!(idle, RefreshState::Idle);
        assert!(idle.can_trigger(now));

        let backing_off = RefreshState::after_failure(
            RefreshFailurePolicy::retry_after(Duration::from_millis(500)),
            now,
        );
        assert!(!backing_off.can_trigger(now));
        assert!(backing_off.can_trigger(now + Duration::from_millis(500)));

        let frozen = RefreshState::after_failure(RefreshFailurePolicy::Freeze, now);
        assert_eq!(frozen, RefreshState::Frozen);
        assert!(!frozen.can_trigger(now + Duration::from_secs(3600)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backing_off_phase_expires() {
        let mut entry = Entry::new(1u64, TTL);
        tokio::time::advance(TTL).await;

        let now = Instant::now();
        entry.refresh = RefreshState::BackingOff {
            until: now + Duration::from_millis(50),
        };
        assert_eq!(entry.phase(now), CachePhase::BackingOff);
        assert_eq!(entry.phase(now + Duration::from_millis(50)), CachePhase::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_durations_clamp_instead_of_overflowing() {
        let mut entry = Entry::new(1u64, Duration::MAX);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(entry.is_fresh(Instant::now()));

        entry.install(2, Duration::MAX);
        assert!(entry.expire_at >= Instant::now() + FAR_FUTURE);

        let now = Instant::now();
        let policy = RefreshFailurePolicy::Retry { backoff_ms: u64::MAX };
        let backing_off = RefreshState::after_failure(policy, now);
        assert!(!backing_off.can_trigger(now + Duration::from_secs(86_400 * 365)));
    }

    #[test]
    fn test_in_flight_never_triggers() {
        assert!(!RefreshState::InFlight.can_trigger(Instant::now()));
    }

    #[test]
    fn test_new_state_is_uninitialized() {
        let state: State<u64> = State::new();
        assert_eq!(state.phase(Instant::now()), CachePhase::Uninitialized);
        assert_eq!(state.init_attempts, 0);
    }
}
