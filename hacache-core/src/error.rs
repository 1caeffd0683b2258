//! Error types for hacache.
//!
//! Reads from the cache never fail; these errors cover construction,
//! configuration, and the internal hand-off to the background refresher.

use thiserror::Error;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Main error type for hacache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An environment variable could not be parsed.
    #[error("Failed to parse {key}: {reason}")]
    ConfigParse {
        /// Variable or setting that failed to parse
        key: String,
        /// Parser message
        reason: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // RUNTIME ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The background refresher is no longer receiving requests.
    #[error("Refresher unavailable for cache '{0}'")]
    RefresherUnavailable(String),
}

impl CacheError {
    /// Returns true if this error came from loading or validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidConfig(_)
                | CacheError::ConfigParse { .. }
                | CacheError::Json(_)
                | CacheError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::ConfigParse {
            key: "HACACHE_TTL_MS".into(),
            reason: "invalid digit found in string".into(),
        };
        assert!(err.to_string().contains("HACACHE_TTL_MS"));
        assert!(err.to_string().contains("invalid digit"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CacheError::InvalidConfig("ttl".into()).is_config_error());
        assert!(!CacheError::RefresherUnavailable("users".into()).is_config_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let cache_result: Result<serde_json::Value> = json_result.map_err(CacheError::from);
        assert!(matches!(cache_result, Err(CacheError::Json(_))));
    }
}
