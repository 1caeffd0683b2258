//! Domain types for hacache.
//!
//! - [`CacheConfig`]: Name, TTL, init retry delay, and failure policy
//! - [`RefreshFailurePolicy`]: What a failed background refresh does to later triggers
//! - [`CachePhase`]: Where a cache sits in its refresh state machine
//! - [`CacheStats`]: Point-in-time snapshot for diagnostics

mod config;
mod phase;
mod stats;

pub use config::*;
pub use phase::*;
pub use stats::*;
