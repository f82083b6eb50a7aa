//! Rate limiter configuration and types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default window width in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u64 = 10;

/// Widest window accepted (one year).
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

/// Invalid rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitConfigError {
    #[error("rate limit window must be at least one second")]
    ZeroWindow,
    #[error("rate limit window of {0}s exceeds the one year maximum")]
    WindowTooLarge(u64),
}

/// Window width and admission cap for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    window_secs: u64,
    max_requests: u64,
}

impl RateLimitConfig {
    /// Create a config. `max_requests` may be zero, which rejects every
    /// request once a hit has been recorded.
    pub fn new(window_secs: u64, max_requests: u64) -> Result<Self, RateLimitConfigError> {
        if window_secs == 0 {
            return Err(RateLimitConfigError::ZeroWindow);
        }
        if window_secs > MAX_WINDOW_SECS {
            return Err(RateLimitConfigError::WindowTooLarge(window_secs));
        }
        Ok(Self {
            window_secs,
            max_requests,
        })
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Window width in milliseconds.
    pub fn window_ms(&self) -> i64 {
        // Bounded by MAX_WINDOW_SECS, cannot overflow.
        (self.window_secs * 1000) as i64
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// What the HTTP layer does when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreFailurePolicy {
    /// Reject the request with 503.
    #[default]
    #[serde(alias = "deny")]
    FailClosed,
    /// Let the request through and log the failure.
    #[serde(alias = "allow")]
    FailOpen,
}

impl FromStr for StoreFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" | "fail-closed" | "closed" => Ok(Self::FailClosed),
            "allow" | "fail-open" | "open" => Ok(Self::FailOpen),
            other => Err(format!(
                "unknown store failure policy '{}' (expected deny or allow)",
                other
            )),
        }
    }
}

impl fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailClosed => f.write_str("fail-closed"),
            Self::FailOpen => f.write_str("fail-open"),
        }
    }
}

/// Which counter store backs the limiter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CounterBackend {
    /// Per-process in-memory counters.
    Memory,
    /// SQLite database at the configured `database_url`.
    #[default]
    Sqlite,
    /// Redis server at this URL.
    Redis(String),
}

impl FromStr for CounterBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with("redis://") || trimmed.starts_with("rediss://") {
            return Ok(Self::Redis(trimmed.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "sqlite" | "database" => Ok(Self::Sqlite),
            other => Err(format!(
                "unknown rate limit backend '{}' (expected memory, sqlite or a redis:// URL)",
                other
            )),
        }
    }
}

impl fmt::Display for CounterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Sqlite => f.write_str("sqlite"),
            Self::Redis(_) => f.write_str("redis"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window_secs(), 60);
        assert_eq!(config.max_requests(), 10);
        assert_eq!(config.window_ms(), 60_000);
    }

    #[test]
    fn test_rejects_zero_window() {
        assert_eq!(
            RateLimitConfig::new(0, 10),
            Err(RateLimitConfigError::ZeroWindow)
        );
    }

    #[test]
    fn test_rejects_oversized_window() {
        assert!(matches!(
            RateLimitConfig::new(MAX_WINDOW_SECS + 1, 10),
            Err(RateLimitConfigError::WindowTooLarge(_))
        ));
    }

    #[test]
    fn test_allows_zero_max_requests() {
        let config = RateLimitConfig::new(30, 0).unwrap();
        assert_eq!(config.max_requests(), 0);
    }

    #[test]
    fn test_store_failure_policy_parsing() {
        assert_eq!("deny".parse::<StoreFailurePolicy>(), Ok(StoreFailurePolicy::FailClosed));
        assert_eq!("ALLOW".parse::<StoreFailurePolicy>(), Ok(StoreFailurePolicy::FailOpen));
        assert_eq!("fail-open".parse::<StoreFailurePolicy>(), Ok(StoreFailurePolicy::FailOpen));
        assert!("maybe".parse::<StoreFailurePolicy>().is_err());
    }

    #[test]
    fn test_counter_backend_parsing() {
        assert_eq!("memory".parse::<CounterBackend>(), Ok(CounterBackend::Memory));
        assert_eq!(" SQLite ".parse::<CounterBackend>(), Ok(CounterBackend::Sqlite));
        assert_eq!(
            "redis://localhost:6379".parse::<CounterBackend>(),
            Ok(CounterBackend::Redis("redis://localhost:6379".to_string()))
        );
        assert!("postgres".parse::<CounterBackend>().is_err());
    }
}
