//! Defaults and environment variable names for hacache.

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache name used when none is configured.
pub const DEFAULT_CACHE_NAME: &str = "default";

/// Default freshness window after a successful load: one minute.
pub const DEFAULT_TTL_MS: u64 = 60_000;

/// Fixed delay between failed initial load attempts.
pub const DEFAULT_INIT_RETRY_DELAY_MS: u64 = 1_000;

/// Default wait after a failed refresh before a stale read may trigger another.
pub const DEFAULT_REFRESH_BACKOFF_MS: u64 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Environment variable holding the cache name.
pub const ENV_NAME: &str = "HACACHE_NAME";

/// Environment variable holding the TTL in milliseconds.
pub const ENV_TTL_MS: &str = "HACACHE_TTL_MS";

/// Environment variable holding the init retry delay in milliseconds.
pub const ENV_INIT_RETRY_DELAY_MS: &str = "HACACHE_INIT_RETRY_DELAY_MS";

/// Environment variable holding the failure policy (`retry`, `retry:<ms>`, `freeze`).
pub const ENV_FAILURE_POLICY: &str = "HACACHE_FAILURE_POLICY";
