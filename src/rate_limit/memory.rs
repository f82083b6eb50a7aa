//! In-memory counter store for single-process operation.
//!
//! Fast, lock-based store for rate limiting within a single process.
//! Counters are not persisted across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{CounterStore, RateWindowCounter, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    identifier: String,
    context: String,
    window_start_ms: i64,
}

impl CounterKey {
    fn new(identifier: &str, context: &str, window_start_ms: i64) -> Self {
        Self {
            identifier: identifier.to_string(),
            context: context.to_string(),
            window_start_ms,
        }
    }
}

/// In-memory counter store.
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    counters: Arc<RwLock<HashMap<CounterKey, u64>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored counter, ordered by window start.
    pub async fn counters(&self) -> Vec<RateWindowCounter> {
        let counters = self.counters.read().await;
        let mut all: Vec<_> = counters
            .iter()
            .map(|(k, hits)| RateWindowCounter {
                identifier: k.identifier.clone(),
                context: k.context.clone(),
                window_start_ms: k.window_start_ms,
                hits: *hits,
            })
            .collect();
        all.sort_by_key(|c| c.window_start_ms);
        all
    }

    /// Number of stored counters.
    pub async fn len(&self) -> usize {
        self.counters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.counters.read().await.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn upsert_increment(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<u64> {
        // Read and write happen under one write guard.
        let mut counters = self.counters.write().await;
        let hits = counters
            .entry(CounterKey::new(identifier, context, window_start_ms))
            .or_insert(0);
        *hits += 1;
        Ok(*hits)
    }

    async fn get(
        &self,
        identifier: &str,
        context: &str,
        window_start_ms: i64,
    ) -> StoreResult<Option<u64>> {
        let counters = self.counters.read().await;
        Ok(counters
            .get(&CounterKey::new(identifier, context, window_start_ms))
            .copied())
    }

    async fn delete_older_than(&self, threshold_ms: i64) -> StoreResult<u64> {
        let mut counters = self.counters.write().await;
        let before = counters.len();
        counters.retain(|k, _| k.window_start_ms >= threshold_ms);
        Ok((before - counters.len()) as u64)
    }

    async fn delete_context_older_than(
        &self,
        context: &str,
        threshold_ms: i64,
    ) -> StoreResult<u64> {
        let mut counters = self.counters.write().await;
        let before = counters.len();
        counters.retain(|k, _| k.context != context || k.window_start_ms >= threshold_ms);
        Ok((before - counters.len()) as u64)
    }
}
