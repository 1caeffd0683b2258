//! Common traits for hacache.
//!
//! The cache never talks to a data source directly. Everything it knows about
//! the outside world goes through [`Query`], so a database call, an HTTP fetch,
//! or a test double can all sit behind the same cache.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for the expensive computation a cache holds the result of.
///
/// `A` is the opaque argument handed over by callers. `None` is passed when
/// neither the caller nor the cache owner supplied one.
///
/// Implementations own their failure semantics: the cache only logs
/// [`Query::Error`] and never surfaces it to readers.
#[async_trait]
pub trait Query<A: Send + 'static>: Send + Sync + 'static {
    /// The value produced by a successful query.
    type Value: Clone + Send + Sync + 'static;

    /// The error produced by a failed query.
    type Error: Display + Send + 'static;

    /// Computes a fresh value.
    async fn query(&self, arg: Option<A>) -> std::result::Result<Self::Value, Self::Error>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOSURE ADAPTER
// ═══════════════════════════════════════════════════════════════════════════════

/// A [`Query`] backed by an async closure. Built with [`query_fn`].
#[derive(Clone)]
pub struct QueryFn<F>(F);

/// Wraps an async closure so it can be used as a [`Query`].
///
/// ```rust
/// use hacache_core::{query_fn, Query};
///
/// let source = query_fn(|region: Option<String>| async move {
///     Ok::<_, std::io::Error>(format!("config for {}", region.unwrap_or_default()))
/// });
/// # let _ = source;
/// ```
pub fn query_fn<F>(f: F) -> QueryFn<F> {
    QueryFn(f)
}

#[async_trait]
impl<A, F, Fut, V, E> Query<A> for QueryFn<F>
where
    A: Send + 'static,
    F: Fn(Option<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Display + Send + 'static,
{
    type Value = V;
    type Error = E;

    async fn query(&self, arg: Option<A>) -> std::result::Result<V, E> {
        (self.0)(arg).await
    }
}
