//! Redis-backed counter store for distributed multi-process coordination.
//!
//! Uses Lua scripts so each increment and each sweep is a single atomic
//! operation on the server.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::store::{CounterStore, StoreError, StoreResult};

/// Key prefix for rate limit data in Redis.
const KEY_PREFIX: &str = "jobgate:ratelimit:";

/// Sorted set indexing every counter key by its window start.
const WINDOW_INDEX_KEY: &str = "jobgate:ratelimit:windows";

/// KEYS: counter, global index, context index. ARGV: window start.
const INCREMENT_SCRIPT: &str = r#"
    local hits = redis.call('INCR', KEYS[1])
    redis.call('ZADD', KEYS[2], ARGV[1], KEYS[1])
    redis.call('ZADD', KEYS[3], ARGV[1], KEYS[1])
    return hits
"#;

/// KEYS: the index to sweep, then an index to prune alongside (may be the
/// same key). ARGV: threshold.
const SWEEP_SCRIPT: &str = r#"
    local cutoff = '(' .. ARGV[1]
    local keys = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', cutoff)
    local removed = 0
    for _, key in ipairs(keys) do
        removed = removed + redis.call('DEL', key)
        redis.call('ZREM', KEYS[2], key)
    end
    redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', cutoff)
    return removed
"#;

/// Redis-backed counter storage.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    /// Create a new Redis counter store.
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn new(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("Redis connection error: {}", e)))?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Unavailable(format!("Redis connection manager error: {}", e))
        })?;

        Ok(Self { conn })
    }

    /// Get the Redis key for one window counter.
    fn counter_key(identifier: &str, context: &str, window_start_ms: i64) -> String {
        format!(
            "{}counter:{}:{}:{}",
            KEY_PREFIX, context, window_start_ms, identifier
        )
    }

    /// Sorted set indexing one context's counter keys by window start.
    fn context_index_key(context: &str) -> String {
        format!("{}windows:{}", KEY_PREFIX, context)
    }

    async fn sweep(&self, index: &str, also_prune: &str, threshold_ms: i64) -> StoreResult<u64> {
        let mut conn = self.conn.clone();

        let removed: i64 = Script::new(SWEEP_SCRIPT)
            .key(index)
            .key(also_prune)
            .arg(threshold_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_error)?;

        Ok(removed.max(0) as u64)
    }
}

fn redis_error(e: redis::RedisError) -> StoreError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn upsert_increment(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let key = Self::counter_key(identifier, context, window_start_ms);

        let hits: i64 = Script::new(INCREMENT_SCRIPT)
            .key(&key)
            .key(WINDOW_INDEX_KEY)
            .key(Self::context_index_key(context))
            .arg(window_start_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_error)?;

        Ok(hits.max(0) as u64)
    }

    async fn get(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<Option<u64>> {
        let mut conn = self.conn.clone();
        let key = Self::counter_key(identifier, context, window_start_ms);

        let hits: Option<i64> = conn.get(&key).await.map_err(redis_error)?;
        Ok(hits.map(|h| h.max(0) as u64))
    }

    async fn delete_older_than(&self, threshold_ms: i64) -> StoreResult<u64> {
        // Per-context indexes keep stale members; their next sweep finds the
        // keys already gone and counts nothing.
        self.sweep(WINDOW_INDEX_KEY, WINDOW_INDEX_KEY, threshold_ms).await
    }

    async fn delete_context_older_than(
        &self,
        context: &str,
        threshold_ms: i64,
    ) -> StoreResult<u64> {
        let index = Self::context_index_key(context);
        self.sweep(&index, WINDOW_INDEX_KEY, threshold_ms).await
    }
}
