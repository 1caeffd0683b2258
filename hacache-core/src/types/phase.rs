//! Refresh state machine types.
//!
//! A cache moves through
//! `Uninitialized -> Fresh -> Stale -> Refreshing -> Fresh | Stale`, with two
//! extra exits after a failed refresh that depend on [`RefreshFailurePolicy`]:
//! `BackingOff` (a later stale read may retry) and `Frozen` (it never will).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::millis_ceil;
use crate::constants::DEFAULT_REFRESH_BACKOFF_MS;
use crate::error::{CacheError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// FAILURE POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// What happens to the refresh trigger after a background refresh fails.
///
/// Initial loads are unaffected: they always retry on a fixed delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RefreshFailurePolicy {
    /// Clear the in-flight state so a later stale read triggers a new attempt,
    /// but not before `backoff_ms` has passed since the failure.
    Retry {
        /// Minimum wait after a failure before the next attempt may start.
        backoff_ms: u64,
    },
    /// Stop refreshing for good and keep serving the last good value.
    Freeze,
}

impl RefreshFailurePolicy {
    /// Retry on the next stale read, with no backoff.
    pub fn retry() -> Self {
        RefreshFailurePolicy::Retry {
            backoff_ms: DEFAULT_REFRESH_BACKOFF_MS,
        }
    }

    /// Retry on a stale read once `backoff` has elapsed since the failure.
    ///
    /// A sub-millisecond remainder rounds up; anything past `u64::MAX`
    /// milliseconds saturates.
    pub fn retry_after(backoff: Duration) -> Self {
        RefreshFailurePolicy::Retry {
            backoff_ms: millis_ceil(backoff),
        }
    }

    /// Backoff after a failure, or `None` when the policy freezes the cache.
    pub fn backoff(&self) -> Option<Duration> {
        match self {
            RefreshFailurePolicy::Retry { backoff_ms } => Some(Duration::from_millis(*backoff_ms)),
            RefreshFailurePolicy::Freeze => None,
        }
    }
}

impl Default for RefreshFailurePolicy {
    fn default() -> Self {
        Self::retry()
    }
}

impl fmt::Display for RefreshFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshFailurePolicy::Retry { backoff_ms: 0 } => write!(f, "retry"),
            RefreshFailurePolicy::Retry { backoff_ms } => write!(f, "retry:{}", backoff_ms),
            RefreshFailurePolicy::Freeze => write!(f, "freeze"),
        }
    }
}

/// Parses `retry`, `retry:<millis>`, or `freeze` (case-insensitive).
impl FromStr for RefreshFailurePolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let parse_err = |reason: String| CacheError::ConfigParse {
            key: "failure policy".into(),
            reason,
        };

        match normalized.split_once(':') {
            None if normalized == "retry" => Ok(Self::retry()),
            None if normalized == "freeze" => Ok(RefreshFailurePolicy::Freeze),
            Some(("retry", millis)) => millis
                .trim()
                .parse::<u64>()
                .map(|backoff_ms| RefreshFailurePolicy::Retry { backoff_ms })
                .map_err(|e| parse_err(format!("invalid backoff '{}': {}", millis, e))),
            _ => Err(parse_err(format!(
                "expected 'retry', 'retry:<ms>' or 'freeze', got '{}'",
                s
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE PHASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Observable state of a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePhase {
    /// No load has succeeded yet; readers wait.
    Uninitialized,
    /// Value is within its TTL.
    Fresh,
    /// Value is past its TTL and no refresh is running.
    Stale,
    /// Value is past its TTL and a background refresh is running.
    Refreshing,
    /// The last refresh failed; the next one waits for the backoff to pass.
    BackingOff,
    /// A refresh failed under [`RefreshFailurePolicy::Freeze`]; no more refreshes.
    Frozen,
}

impl CachePhase {
    /// Returns true once the first load has completed.
    pub fn is_ready(&self) -> bool {
        !matches!(self, CachePhase::Uninitialized)
    }
}

impl fmt::Display for CachePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CachePhase::Uninitialized => "uninitialized",
            CachePhase::Fresh => "fresh",
            CachePhase::Stale => "stale",
            CachePhase::Refreshing => "refreshing",
            CachePhase::BackingOff => "backing_off",
            CachePhase::Frozen => "frozen",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("retry", RefreshFailurePolicy::Retry { backoff_ms: 0 } ; "plain retry")]
    #[test_case("RETRY:250", RefreshFailurePolicy::Retry { backoff_ms: 250 } ; "retry with backoff")]
    #[test_case(" freeze ", RefreshFailurePolicy::Freeze ; "freeze with whitespace")]
    fn test_policy_parse(input: &str, expected: RefreshFailurePolicy) {
        assert_eq!(input.parse::<RefreshFailurePolicy>().unwrap(), expected);
    }

    #[test_case("retry:soon" ; "non numeric backoff")]
    #[test_case("never" ; "unknown mode")]
    #[test_case("freeze:10" ; "freeze takes no argument")]
    fn test_policy_parse_rejects(input: &str) {
        let err = input.parse::<RefreshFailurePolicy>().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_policy_display_roundtrips_through_parse() {
        for policy in [
            RefreshFailurePolicy::retry(),
            RefreshFailurePolicy::Retry { backoff_ms: 1500 },
            RefreshFailurePolicy::Freeze,
        ] {
            assert_eq!(policy.to_string().parse::<RefreshFailurePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_policy_backoff() {
        assert_eq!(RefreshFailurePolicy::retry().backoff(), Some(Duration::ZERO));
        assert_eq!(
            RefreshFailurePolicy::retry_after(Duration::from_secs(2)).backoff(),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(RefreshFailurePolicy::Freeze.backoff(), None);
    }

    #[test]
    fn test_retry_after_rounds_and_saturates() {
        assert_eq!(
            RefreshFailurePolicy::retry_after(Duration::from_micros(1)),
            RefreshFailurePolicy::Retry { backoff_ms: 1 }
        );
        assert_eq!(
            RefreshFailurePolicy::retry_after(Duration::from_secs(u64::MAX / 1000 + 1)),
            RefreshFailurePolicy::Retry { backoff_ms: u64::MAX }
        );
    }

    #[test]
    fn test_policy_json_shape() {
        let json = serde_json::to_value(RefreshFailurePolicy::Retry { backoff_ms: 10 }).unwrap();
        assert_eq!(json, serde_json::json!({ "mode": "retry", "backoff_ms": 10 }));

        let frozen: RefreshFailurePolicy = serde_json::from_str(r#"{"mode":"freeze"}"#).unwrap();
        assert_eq!(frozen, RefreshFailurePolicy::Freeze);
    }

    #[test]
    fn test_phase_readiness() {
        assert!(!CachePhase::Uninitialized.is_ready());
        assert!(CachePhase::Stale.is_ready());
        assert!(CachePhase::Frozen.is_ready());
        assert_eq!(CachePhase::BackingOff.to_string(), "backing_off");
    }
}
