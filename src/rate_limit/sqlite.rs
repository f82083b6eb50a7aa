//! Diesel-backed counter store for persistent multi-process coordination.
//!
//! Stores window counters in SQLite so every process pointing at the same
//! database file shares one view of caller traffic.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::debug;

use super::store::{CounterStore, StoreError, StoreResult};
use crate::repository::SqlitePool;
use crate::schema::rate_limit_counters;

/// Diesel-backed counter storage (SQLite).
#[derive(Clone)]
pub struct DieselCounterStore {
    pool: SqlitePool,
}

impl DieselCounterStore {
    /// Create a new Diesel counter store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create from a SQLite file path.
    pub fn from_sqlite_path(path: &std::path::Path) -> Self {
        Self::new(SqlitePool::from_path(path))
    }

    /// Create the counter table if it doesn't exist.
    pub async fn init_schema(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.batch_execute(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS rate_limit_counters (
                identifier TEXT NOT NULL,
                context TEXT NOT NULL,
                window_start_ms BIGINT NOT NULL,
                hits BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (identifier, context, window_start_ms)
            );

            CREATE INDEX IF NOT EXISTS idx_rate_limit_counters_window
                ON rate_limit_counters(window_start_ms);
            "#,
        )
        .await?;
        Ok(())
    }

    async fn connection(&self) -> StoreResult<crate::repository::SqliteConn> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl CounterStore for DieselCounterStore {
    async fn upsert_increment(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<u64> {
        let mut conn = self.connection().await?;

        // Single INSERT .. ON CONFLICT .. RETURNING statement; SQLite applies
        // it atomically so concurrent increments never overwrite each other.
        let hits: i64 = diesel::insert_into(rate_limit_counters::table)
            .values((
                rate_limit_counters::identifier.eq(identifier),
                rate_limit_counters::context.eq(context),
                rate_limit_counters::window_start_ms.eq(window_start_ms),
                rate_limit_counters::hits.eq(1i64),
            ))
            .on_conflict((
                rate_limit_counters::identifier,
                rate_limit_counters::context,
                rate_limit_counters::window_start_ms,
            ))
            .do_update()
            .set(rate_limit_counters::hits.eq(rate_limit_counters::hits + 1i64))
            .returning(rate_limit_counters::hits)
            .get_result(&mut conn)
            .await?;

        Ok(hits.max(0) as u64)
    }

    async fn get(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<Option<u64>> {
        let mut conn = self.connection().await?;

        let hits: Option<i64> = rate_limit_counters::table
            .find((identifier, context, window_start_ms))
            .select(rate_limit_counters::hits)
            .first(&mut conn)
            .await
            .optional()?;

        Ok(hits.map(|h| h.max(0) as u64))
    }

    async fn delete_older_than(&self, threshold_ms: i64) -> StoreResult<u64> {
        let mut conn = self.connection().await?;

        let removed = diesel::delete(
            rate_limit_counters::table.filter(rate_limit_counters::window_start_ms.lt(threshold_ms)),
        )
        .execute(&mut conn)
        .await?;

        if removed > 0 {
            debug!(removed, threshold_ms, "Removed expired rate limit counters");
        }
        Ok(removed as u64)
    }

    async fn delete_context_older_than(
        &self,
        context: &str,
        threshold_ms: i64,
    ) -> StoreResult<u64> {
        let mut conn = self.connection().await?;

        let removed = diesel::delete(
            rate_limit_counters::table
                .filter(rate_limit_counters::context.eq(context))
                .filter(rate_limit_counters::window_start_ms.lt(threshold_ms)),
        )
        .execute(&mut conn)
        .await?;

        if removed > 0 {
            debug!(removed, context, threshold_ms, "Removed expired rate limit counters");
        }
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_store() -> (tempfile::TempDir, DieselCounterStore) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = DieselCounterStore::from_sqlite_path(&db_path);
        store.init_schema().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_increment_creates_and_increments() {
        let (_dir, store) = setup_store().await;

        assert_eq!(store.upsert_increment("1.2.3.4", "jobs:ip", 0).await.unwrap(), 1);
        assert_eq!(store.upsert_increment("1.2.3.4", "jobs:ip", 0).await.unwrap(), 2);
        assert_eq!(store.upsert_increment("1.2.3.4", "jobs:ip", 0).await.unwrap(), 3);
        assert_eq!(store.get("1.2.3.4", "jobs:ip", 0).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_get_missing_counter() {
        let (_dir, store) = setup_store().await;
        assert_eq!(store.get("nobody", "jobs:ip", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        {
            let store = DieselCounterStore::from_sqlite_path(&db_path);
            store.init_schema().await.unwrap();
            store.upsert_increment("user-1", "jobs:user", 60_000).await.unwrap();
            store.upsert_increment("user-1", "jobs:user", 60_000).await.unwrap();
        }

        {
            let store = DieselCounterStore::from_sqlite_path(&db_path);
            store.init_schema().await.unwrap();
            assert_eq!(store.get("user-1", "jobs:user", 60_000).await.unwrap(), Some(2));
        }
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let (_dir, store) = setup_store().await;

        store.upsert_increment("a", "api", 0).await.unwrap();
        store.upsert_increment("a", "api", 60_000).await.unwrap();
        store.upsert_increment("b", "api", 120_000).await.unwrap();

        assert_eq!(store.delete_older_than(60_000).await.unwrap(), 1);
        assert_eq!(store.get("a", "api", 0).await.unwrap(), None);
        assert_eq!(store.get("a", "api", 60_000).await.unwrap(), Some(1));
        assert_eq!(store.get("b", "api", 120_000).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_delete_context_older_than() {
        let (_dir, store) = setup_store().await;

        store.upsert_increment("a", "jobs:ip", 0).await.unwrap();
        store.upsert_increment("alice", "jobs:user", 0).await.unwrap();

        assert_eq!(store.delete_context_older_than("jobs:ip", 60_000).await.unwrap(), 1);
        assert_eq!(store.get("a", "jobs:ip", 0).await.unwrap(), None);
        assert_eq!(store.get("alice", "jobs:user", 0).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (_dir, store) = setup_store().await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert_increment("hot", "api", 0).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("hot", "api", 0).await.unwrap(), Some(20));
    }

    #[tokio::test]
    async fn test_missing_schema_surfaces_error() {
        let dir = tempdir().unwrap();
        let store = DieselCounterStore::from_sqlite_path(&dir.path().join("empty.db"));

        let err = store.upsert_increment("a", "api", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
