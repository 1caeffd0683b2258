//! Single-entry stale-while-revalidate cache.
//!
//! [`RefreshingCache`] holds one expensive value. Readers block only until the
//! first load succeeds; after that a stale read returns immediately and kicks
//! off at most one background refresh.
//!
//! ```rust
//! use std::time::Duration;
//! use hacache_cache::{query_fn, RefreshingCache};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let source = query_fn(|_: Option<()>| async { Ok::<_, std::io::Error>(vec!["flag-a", "flag-b"]) });
//! let flags: RefreshingCache<(), _> = RefreshingCache::new("feature-flags", Duration::from_secs(30), source, None);
//!
//! assert_eq!(flags.get(None).await, vec!["flag-a", "flag-b"]);
//! # }
//! ```

mod cache;
mod state;

pub use cache::RefreshingCache;
pub use hacache_core::{
    query_fn, CacheConfig, CacheError, CachePhase, CacheStats, Query, QueryFn, RefreshFailurePolicy,
};
