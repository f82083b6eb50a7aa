//! Sliding window rate limiting for inbound requests.
//!
//! Counters live in a pluggable store:
//! - In-memory (default for tests and single-process use)
//! - SQLite (shared between processes on one host)
//! - Redis (distributed, requires the `redis-backend` feature)

mod admission;
mod clock;
mod config;
mod identifier;
mod limiter;
mod memory;
mod sqlite;
mod store;

#[cfg(feature = "redis-backend")]
mod redis;

pub use admission::{
    retry_after_secs, Admission, AdmissionError, Rejection, IP_CONTEXT, USER_CONTEXT,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    CounterBackend, RateLimitConfig, RateLimitConfigError, StoreFailurePolicy,
    DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS,
};
pub use identifier::{authenticated_user, client_identifier, DEFAULT_USER_HEADER, UNKNOWN_IDENTIFIER};
pub use limiter::{previous_window_weight, RateLimitDecision, SlidingWindowLimiter, WindowBounds};
pub use memory::InMemoryCounterStore;
pub use sqlite::DieselCounterStore;
pub use store::{BoxedCounterStore, CounterStore, RateWindowCounter, StoreError, StoreResult};

#[cfg(feature = "redis-backend")]
pub use redis::RedisCounterStore;

use std::sync::Arc;

use tracing::info;

use crate::repository::util::is_postgres_url;
use crate::repository::SqlitePool;

/// Open the configured counter store, creating the SQLite schema if needed.
pub async fn open_store(
    backend: &CounterBackend,
    database_url: &str,
) -> StoreResult<BoxedCounterStore> {
    match backend {
        CounterBackend::Memory => {
            info!("Using in-memory rate limit counters");
            Ok(Arc::new(InMemoryCounterStore::new()))
        }
        CounterBackend::Sqlite => {
            if is_postgres_url(database_url) {
                return Err(StoreError::Unavailable(
                    "PostgreSQL is not supported for rate limit counters; use sqlite or redis"
                        .to_string(),
                ));
            }
            let store = DieselCounterStore::new(SqlitePool::new(database_url));
            store.init_schema().await?;
            info!("Using SQLite rate limit counters");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "redis-backend")]
        CounterBackend::Redis(url) => {
            let store = RedisCounterStore::new(url).await?;
            info!("Using Redis rate limit counters");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-backend"))]
        CounterBackend::Redis(_) => Err(StoreError::Unavailable(
            "Redis backend requires the redis-backend feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = open_store(&CounterBackend::Memory, "unused").await.unwrap();
        assert_eq!(store.upsert_increment("a", "api", 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_sqlite_store_creates_schema() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("counters.db").display());

        let store = open_store(&CounterBackend::Sqlite, &url).await.unwrap();
        assert_eq!(store.upsert_increment("a", "api", 0).await.unwrap(), 1);
        assert_eq!(store.get("a", "api", 0).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_open_rejects_postgres() {
        let result = open_store(&CounterBackend::Sqlite, "postgres://localhost/jobs").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
