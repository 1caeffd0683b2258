//! Cache statistics.

use serde::{Deserialize, Serialize};

use super::CachePhase;

/// Point-in-time snapshot of a cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Cache name
    pub name: String,
    /// Current phase of the refresh state machine
    pub phase: CachePhase,
    /// Initial load attempts so far, including the successful one
    pub init_attempts: u64,
    /// Background refreshes that installed a new value
    pub refreshes: u64,
    /// Background refreshes that failed
    pub refresh_failures: u64,
    /// Milliseconds until the current value goes stale (0 once stale or before the first load)
    pub expires_in_ms: u64,
}

impl CacheStats {
    /// Background refreshes started so far, successful or not.
    pub fn refresh_attempts(&self) -> u64 {
        self.refreshes + self.refresh_failures
    }
}
