//! Cache configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RefreshFailurePolicy;
use crate::constants::*;
use crate::error::{CacheError, Result};

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name used in every log line about this cache
    pub name: String,
    /// How long a value stays fresh after a successful load, in milliseconds
    pub ttl_ms: u64,
    /// Delay between failed initial load attempts, in milliseconds
    pub init_retry_delay_ms: u64,
    /// What a failed background refresh does to later refresh triggers
    pub failure_policy: RefreshFailurePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CACHE_NAME.into(),
            ttl_ms: DEFAULT_TTL_MS,
            init_retry_delay_ms: DEFAULT_INIT_RETRY_DELAY_MS,
            failure_policy: RefreshFailurePolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the TTL.
    ///
    /// Sub-millisecond remainders round up, so a non-zero TTL never becomes
    /// zero. TTLs longer than `u64::MAX` milliseconds saturate.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = millis_ceil(ttl);
        self
    }

    /// Sets the delay between failed initial load attempts.
    ///
    /// Rounds and saturates the same way as [`CacheConfig::with_ttl`].
    pub fn with_init_retry_delay(mut self, delay: Duration) -> Self {
        self.init_retry_delay_ms = millis_ceil(delay);
        self
    }

    /// Sets the refresh failure policy.
    pub fn with_failure_policy(mut self, policy: RefreshFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Init retry delay as a [`Duration`].
    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }

    /// Checks the configuration for values the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CacheError::InvalidConfig("name must not be empty".into()));
        }
        if self.ttl_ms == 0 {
            return Err(CacheError::InvalidConfig("ttl must be greater than zero".into()));
        }
        // A zero delay would spin on a source that is down.
        if self.init_retry_delay_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "init retry delay must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Loads configuration from `HACACHE_*` environment variables (and `.env`),
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_NAME) {
            config.name = name;
        }
        if let Some(ttl) = lookup(ENV_TTL_MS) {
            config.ttl_ms = parse_millis(ENV_TTL_MS, &ttl)?;
        }
        if let Some(delay) = lookup(ENV_INIT_RETRY_DELAY_MS) {
            config.init_retry_delay_ms = parse_millis(ENV_INIT_RETRY_DELAY_MS, &delay)?;
        }
        if let Some(policy) = lookup(ENV_FAILURE_POLICY) {
            config.failure_policy = policy.parse().map_err(|e| match e {
                CacheError::ConfigParse { reason, .. } => CacheError::ConfigParse {
                    key: ENV_FAILURE_POLICY.into(),
                    reason,
                },
                other => other,
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

/// Whole milliseconds in `duration`, rounded up and saturating at `u64::MAX`.
pub(crate) fn millis_ceil(duration: Duration) -> u64 {
    let partial = u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(duration.as_millis() + partial).unwrap_or(u64::MAX)
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| CacheError::ConfigParse {
        key: key.into(),
        reason: format!("'{}': {}", value, e),
    })
}
