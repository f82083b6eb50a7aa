//! Sliding window rate limiter.
//!
//! Blends the current fixed window with a linearly decaying share of the
//! previous one, approximating a rolling count at two counters per key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::RateLimitConfig;
use super::store::{BoxedCounterStore, StoreResult};

/// Outcome of one limiter evaluation. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    /// End of the current window.
    pub reset_at: DateTime<Utc>,
}

/// Window boundaries for one evaluation, in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start_ms: i64,
    pub end_ms: i64,
    pub previous_start_ms: i64,
    /// Counters starting before this are garbage.
    pub expired_before_ms: i64,
}

impl WindowBounds {
    pub fn at(now_ms: i64, window_ms: i64) -> Self {
        let start_ms = now_ms.div_euclid(window_ms) * window_ms;
        Self {
            start_ms,
            end_ms: start_ms + window_ms,
            previous_start_ms: start_ms - window_ms,
            expired_before_ms: start_ms - 2 * window_ms,
        }
    }
}

/// Share of the previous window still counted at `now_ms`: 1 at window
/// start, 0 at window end.
pub fn previous_window_weight(now_ms: i64, window_start_ms: i64, window_ms: i64) -> f64 {
    let elapsed = (now_ms - window_start_ms) as f64;
    (1.0 - elapsed / window_ms as f64).max(0.0)
}

/// Stateless sliding window limiter over a shared counter store.
///
/// Every evaluation records one hit, whether it is allowed or not.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    store: BoxedCounterStore,
    clock: Arc<dyn Clock>,
    defaults: RateLimitConfig,
}

impl SlidingWindowLimiter {
    /// Create a limiter using the system clock.
    pub fn new(store: BoxedCounterStore, defaults: RateLimitConfig) -> Self {
        Self::with_clock(store, defaults, Arc::new(SystemClock))
    }

    /// Create a limiter with a custom clock.
    pub fn with_clock(
        store: BoxedCounterStore,
        defaults: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            defaults,
        }
    }

    /// Config used when a call site does not supply its own.
    pub fn defaults(&self) -> &RateLimitConfig {
        &self.defaults
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Record a hit for `(identifier, context)` and decide whether it may proceed.
    ///
    /// Store failures are returned to the caller, never treated as allowed.
    pub async fn evaluate(
        &self,
        identifier: &str,
        context: &str,
        config: &RateLimitConfig,
    ) -> StoreResult<RateLimitDecision> {
        let now_ms = self.clock.now().timestamp_millis();
        let window_ms = config.window_ms();
        let bounds = WindowBounds::at(now_ms, window_ms);

        // Each context sweeps only its own counters; contexts may use
        // different window widths.
        self.store
            .delete_context_older_than(context, bounds.expired_before_ms)
            .await?;

        let current_hits = self
            .store
            .upsert_increment(identifier, context, bounds.start_ms)
            .await?;
        let previous_hits = self
            .store
            .get(identifier, context, bounds.previous_start_ms)
            .await?
            .unwrap_or(0);

        let weight = previous_window_weight(now_ms, bounds.start_ms, window_ms);
        let effective_hits = current_hits as f64 + weight * previous_hits as f64;
        let max_requests = config.max_requests() as f64;

        let allowed = effective_hits <= max_requests;
        let remaining = (max_requests - effective_hits).floor().max(0.0) as u64;

        debug!(
            identifier,
            context,
            current_hits,
            previous_hits,
            weight,
            effective_hits,
            allowed,
            remaining,
            "Rate limit evaluated"
        );

        Ok(RateLimitDecision {
            allowed,
            remaining,
            reset_at: DateTime::from_timestamp_millis(bounds.end_ms)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::clock::MockClock;
    use crate::rate_limit::memory::InMemoryCounterStore;
    use crate::rate_limit::store::{CounterStore, StoreError};
    use async_trait::async_trait;
    use chrono::TimeDelta;

    /// A fixed instant aligned to a 60s boundary.
    const T0: i64 = 1_700_000_040_000;

    fn setup(now_ms: i64) -> (InMemoryCounterStore, MockClock, SlidingWindowLimiter) {
        let store = InMemoryCounterStore::new();
        let clock = MockClock::at_millis(now_ms);
        let limiter = SlidingWindowLimiter::with_clock(
            Arc::new(store.clone()),
            RateLimitConfig::default(),
            Arc::new(clock.clone()),
        );
        (store, clock, limiter)
    }

    #[test]
    fn test_window_bounds_alignment() {
        assert_eq!(T0 % 60_000, 0);
        let bounds = WindowBounds::at(T0 + 12_345, 60_000);
        assert_eq!(bounds.start_ms, T0);
        assert_eq!(bounds.end_ms, T0 + 60_000);
        assert_eq!(bounds.previous_start_ms, T0 - 60_000);
        assert_eq!(bounds.expired_before_ms, T0 - 120_000);
    }

    #[test]
    fn test_weight_decays_linearly() {
        assert_eq!(previous_window_weight(T0, T0, 60_000), 1.0);
        assert_eq!(previous_window_weight(T0 + 30_000, T0, 60_000), 0.5);
        assert!(previous_window_weight(T0 + 59_999, T0, 60_000) < 0.001);
        assert_eq!(previous_window_weight(T0 + 90_000, T0, 60_000), 0.0);
    }

    #[tokio::test]
    async fn test_allows_up_to_max_within_one_window() {
        let (_store, _clock, limiter) = setup(T0 + 5_000);
        let config = RateLimitConfig::new(60, 10).unwrap();

        for i in 0..10 {
            let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 10 - (i + 1));
        }
    }

    #[tokio::test]
    async fn test_rejects_request_past_max() {
        let (store, _clock, limiter) = setup(T0 + 5_000);
        let config = RateLimitConfig::new(60, 10).unwrap();

        for _ in 0..10 {
            limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
        }
        let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);

        // The rejected call was counted too.
        assert_eq!(store.get("1.2.3.4", "api", T0).await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn test_reset_at_is_window_end() {
        let (_store, _clock, limiter) = setup(T0 + 5_000);
        let decision = limiter
            .evaluate("1.2.3.4", "api", &RateLimitConfig::default())
            .await
            .unwrap();
        assert_eq!(decision.reset_at.timestamp_millis(), T0 + 60_000);
    }

    #[tokio::test]
    async fn test_full_previous_window_blocks_at_boundary() {
        let (store, _clock, limiter) = setup(T0);
        let config = RateLimitConfig::new(60, 10).unwrap();

        for _ in 0..10 {
            store.upsert_increment("1.2.3.4", "api", T0 - 60_000).await.unwrap();
        }

        let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_previous_window_decays_toward_window_end() {
        let (store, _clock, limiter) = setup(T0 + 59_999);
        let config = RateLimitConfig::new(60, 10).unwrap();

        for _ in 0..100 {
            store.upsert_increment("1.2.3.4", "api", T0 - 60_000).await.unwrap();
        }

        // weight ~ 1/60000, so 100 previous hits contribute well under one.
        let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 8);
    }

    #[tokio::test]
    async fn test_half_elapsed_counts_half_previous() {
        let (store, _clock, limiter) = setup(T0 + 30_000);
        let config = RateLimitConfig::new(60, 10).unwrap();

        for _ in 0..10 {
            store.upsert_increment("1.2.3.4", "api", T0 - 60_000).await.unwrap();
        }

        // effective = current + 0.5 * 10
        for expected_remaining in [4, 3, 2, 1, 0] {
            let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_zero_max_requests_always_rejects() {
        let (_store, _clock, limiter) = setup(T0);
        let config = RateLimitConfig::new(60, 0).unwrap();

        let decision = limiter.evaluate("1.2.3.4", "api", &config).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_contexts_and_identifiers_are_independent() {
        let (_store, _clock, limiter) = setup(T0);
        let config = RateLimitConfig::new(60, 1).unwrap();

        assert!(limiter.evaluate("a", "jobs:ip", &config).await.unwrap().allowed);
        assert!(limiter.evaluate("a", "jobs:user", &config).await.unwrap().allowed);
        assert!(limiter.evaluate("b", "jobs:ip", &config).await.unwrap().allowed);
        assert!(!limiter.evaluate("a", "jobs:ip", &config).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_gc_keeps_current_and_previous_windows() {
        let (store, clock, limiter) = setup(T0);
        let config = RateLimitConfig::new(60, 10).unwrap();

        store.upsert_increment("old", "api", T0 - 180_000).await.unwrap();
        store.upsert_increment("edge", "api", T0 - 120_000).await.unwrap();
        store.upsert_increment("prev", "api", T0 - 60_000).await.unwrap();

        limiter.evaluate("x", "api", &config).await.unwrap();

        let starts: Vec<i64> = store
            .counters()
            .await
            .into_iter()
            .map(|c| c.window_start_ms)
            .collect();
        assert!(!starts.contains(&(T0 - 180_000)));
        assert!(starts.contains(&(T0 - 120_000)));
        assert!(starts.contains(&(T0 - 60_000)));

        // Every surviving counter is within two widths of now.
        let now_ms = clock.now().timestamp_millis();
        assert!(starts.iter().all(|s| *s >= now_ms - 2 * 60_000));
    }

    #[tokio::test]
    async fn test_new_window_starts_fresh() {
        let (_store, clock, limiter) = setup(T0);
        let config = RateLimitConfig::new(60, 2).unwrap();

        limiter.evaluate("a", "api", &config).await.unwrap();
        limiter.evaluate("a", "api", &config).await.unwrap();
        assert!(!limiter.evaluate("a", "api", &config).await.unwrap().allowed);

        // Two full windows later the old hits no longer weigh in.
        clock.advance(TimeDelta::seconds(120));
        assert!(limiter.evaluate("a", "api", &config).await.unwrap().allowed);
    }

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn upsert_increment(&self, _: &str, _: &str, _: i64) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn get(&self, _: &str, _: &str, _: i64) -> StoreResult<Option<u64>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete_older_than(&self, _: i64) -> StoreResult<u64> {
            Ok(0)
        }
        async fn delete_context_older_than(&self, _: &str, _: i64) -> StoreResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_propagated() {
        let limiter = SlidingWindowLimiter::new(Arc::new(FailingStore), RateLimitConfig::default());
        let err = limiter
            .evaluate("a", "api", &RateLimitConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
