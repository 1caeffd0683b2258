//! # hacache Core
//!
//! Core types, errors, and traits for the hacache stale-while-revalidate cache.
//!
//! This crate provides the building blocks used by the cache and the CLI:
//!
//! - **Types**: Configuration, refresh failure policy, cache phase and statistics
//! - **Errors**: Error type with a `Result` alias
//! - **Constants**: Defaults and environment variable names
//! - **Traits**: The [`Query`] seam through which the cache reaches its data source
//!
//! ## Example
//!
//! ```rust
//! use hacache_core::{CacheConfig, RefreshFailurePolicy};
//!
//! let config = CacheConfig::named("settings")
//!     .with_ttl(std::time::Duration::from_secs(30))
//!     .with_failure_policy(RefreshFailurePolicy::Freeze);
//! assert!(config.validate().is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{CacheError, Result};
pub use traits::*;
pub use types::*;
