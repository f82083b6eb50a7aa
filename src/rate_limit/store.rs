//! Pluggable counter store backing the sliding window limiter.
//!
//! Allows swapping between in-memory (single process), SQLite (multi-process),
//! or external backends like Redis (distributed).

use std::sync::Arc;

use async_trait::async_trait;

/// Result type for counter store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared counter store.
pub type BoxedCounterStore = Arc<dyn CounterStore>;

/// Errors from counter store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Hits recorded for one (identifier, context, window start) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindowCounter {
    pub identifier: String,
    pub context: String,
    /// Unix timestamp ms, aligned to a window boundary.
    pub window_start_ms: i64,
    pub hits: u64,
}

/// Trait for counter storage backends.
///
/// Implementations must be thread-safe. `upsert_increment` must be a single
/// atomic operation per key: two concurrent increments on the same key are
/// both reflected in the stored count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for a key by one, creating it with `hits = 1`
    /// if absent. Returns the resulting count.
    async fn upsert_increment(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<u64>;

    /// Read a counter without modifying it.
    async fn get(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<Option<u64>>;

    /// Delete every counter whose window starts strictly before `threshold_ms`.
    /// Returns the number of counters removed.
    async fn delete_older_than(&self, threshold_ms: i64) -> StoreResult<u64>;

    /// Like [`delete_older_than`](Self::delete_older_than), restricted to one
    /// context. Counters of other contexts are never touched.
    async fn delete_context_older_than(
        &self,
        context: &str,
        threshold_ms: i64,
    ) -> StoreResult<u64>;
}
