//! Configuration management.
//!
//! Settings are resolved once at startup: built-in defaults, then an
//! optional TOML file, then environment variables (`.env` is loaded first by
//! `main`). Nothing re-reads the environment after that.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rate_limit::{
    CounterBackend, RateLimitConfig, RateLimitConfigError, StoreFailurePolicy,
    DEFAULT_MAX_REQUESTS, DEFAULT_USER_HEADER, DEFAULT_WINDOW_SECS,
};
use crate::repository::util::is_postgres_url;
use crate::upstream::UpstreamConfig;

/// Default SQLite database for persistent counters.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:jobgate.db";

/// Environment variable naming a config file.
pub const CONFIG_PATH_ENV: &str = "JOBGATE_CONFIG";

/// Errors raised while resolving settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {name} ({value:?}): {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error("Invalid {tier} rate limit: {source}")]
    RateLimit {
        tier: &'static str,
        source: RateLimitConfigError,
    },
}

/// Rate limiter settings for both admission tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u64,
    pub user_window_secs: u64,
    pub user_max_requests: u64,
    pub backend: CounterBackend,
    pub on_store_error: StoreFailurePolicy,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            max_requests: DEFAULT_MAX_REQUESTS,
            user_window_secs: DEFAULT_WINDOW_SECS,
            user_max_requests: DEFAULT_MAX_REQUESTS,
            backend: CounterBackend::default(),
            on_store_error: StoreFailurePolicy::default(),
        }
    }
}

impl RateLimitSettings {
    /// Limits for the IP tier. Also the limiter's default config.
    pub fn ip_config(&self) -> Result<RateLimitConfig, ConfigError> {
        RateLimitConfig::new(self.window_secs, self.max_requests)
            .map_err(|source| ConfigError::RateLimit { tier: "ip", source })
    }

    /// Limits for the authenticated-user tier.
    pub fn user_config(&self) -> Result<RateLimitConfig, ConfigError> {
        RateLimitConfig::new(self.user_window_secs, self.user_max_requests)
            .map_err(|source| ConfigError::RateLimit {
                tier: "user",
                source,
            })
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub rate_limit: RateLimitSettings,
    pub upstream: UpstreamConfig,
    /// Database for the SQLite counter store.
    pub database_url: String,
    /// Trusted header carrying the authenticated user id.
    pub user_header: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitSettings::default(),
            upstream: UpstreamConfig::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            user_header: DEFAULT_USER_HEADER.to_string(),
        }
    }
}

impl Settings {
    /// Check if the database URL points at PostgreSQL.
    pub fn is_postgres(&self) -> bool {
        is_postgres_url(&self.database_url)
    }

    /// Validate both tiers so bad limits fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.ip_config()?;
        self.rate_limit.user_config()?;
        if self.user_header.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "user_header".to_string(),
                value: self.user_header.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply process environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RATE_LIMIT_WINDOW_SEC") {
            self.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SEC", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_USER_WINDOW_SEC") {
            self.rate_limit.user_window_secs = parse_env("RATE_LIMIT_USER_WINDOW_SEC", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_USER_MAX_REQUESTS") {
            self.rate_limit.user_max_requests = parse_env("RATE_LIMIT_USER_MAX_REQUESTS", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_BACKEND") {
            tracing::debug!("Using RATE_LIMIT_BACKEND from environment");
            self.rate_limit.backend = parse_env("RATE_LIMIT_BACKEND", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_ON_STORE_ERROR") {
            self.rate_limit.on_store_error = parse_env("RATE_LIMIT_ON_STORE_ERROR", &v)?;
        }
        if let Some(v) = get("DATABASE_URL") {
            tracing::debug!("Using DATABASE_URL from environment");
            self.database_url = v;
        }
        if let Some(v) = get("ADZUNA_APP_ID") {
            self.upstream.app_id = v;
        }
        if let Some(v) = get("ADZUNA_APP_KEY") {
            self.upstream.app_key = v;
        }
        if let Some(v) = get("ADZUNA_COUNTRY") {
            self.upstream.country = v;
        }
        if let Some(v) = get("ADZUNA_BASE_URL") {
            self.upstream.base_url = v;
        }
        if let Some(v) = get("JOBGATE_USER_HEADER") {
            self.user_header = v.trim().to_ascii_lowercase();
        }
        Ok(())
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// `[rate_limit]` table of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_window_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_max_requests: Option<u64>,
    /// `memory`, `sqlite` or a `redis://` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_store_error: Option<StoreFailurePolicy>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_header: Option<String>,
    #[serde(default)]
    pub rate_limit: RateLimitFileConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,
    /// Unknown keys, reported once at load.
    #[serde(flatten)]
    pub unknown: HashMap<String, toml::Value>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config = Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Overlay file values onto settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) -> Result<(), ConfigError> {
        for key in self.unknown.keys() {
            tracing::warn!("Ignoring unknown config key: {}", key);
        }

        if let Some(ref url) = self.database_url {
            settings.database_url = url.clone();
        }
        if let Some(ref header) = self.user_header {
            settings.user_header = header.trim().to_ascii_lowercase();
        }
        if let Some(ref upstream) = self.upstream {
            settings.upstream = upstream.clone();
        }

        let rl = &self.rate_limit;
        if let Some(v) = rl.window_secs {
            settings.rate_limit.window_secs = v;
        }
        if let Some(v) = rl.max_requests {
            settings.rate_limit.max_requests = v;
        }
        if let Some(v) = rl.user_window_secs {
            settings.rate_limit.user_window_secs = v;
        }
        if let Some(v) = rl.user_max_requests {
            settings.rate_limit.user_max_requests = v;
        }
        if let Some(ref backend) = rl.backend {
            settings.rate_limit.backend = parse_env("rate_limit.backend", backend)?;
        }
        if let Some(policy) = rl.on_store_error {
            settings.rate_limit.on_store_error = policy;
        }
        Ok(())
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides `JOBGATE_CONFIG`).
    pub config_path: Option<PathBuf>,
}

/// Config file named explicitly, by `--config` first, then `JOBGATE_CONFIG`.
fn explicit_config_path<F>(options: &LoadOptions, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    options.config_path.clone().or_else(|| {
        lookup(CONFIG_PATH_ENV)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    })
}

/// Discover a jobgate config file in the standard locations.
async fn discover_config_path() -> Option<PathBuf> {
    match prefer::load("jobgate").await {
        Ok(found) => found.source_path().map(|p| p.to_path_buf()),
        Err(_) => None,
    }
}

/// Locate the config file to load, if any.
///
/// Priority: an explicit path, then discovery via `prefer`.
async fn resolve_config_path(options: &LoadOptions) -> Option<PathBuf> {
    if let Some(path) = explicit_config_path(options, |name| std::env::var(name).ok()) {
        return Some(path);
    }
    let discovered = discover_config_path().await;
    if let Some(ref path) = discovered {
        tracing::debug!("Discovered config file: {}", path.display());
    }
    discovered
}

/// Resolve settings from defaults, the config file and the environment.
pub async fn load_settings_with_options(options: LoadOptions) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    if let Some(path) = resolve_config_path(&options).await {
        tracing::debug!("Loading config from {}", path.display());
        let config = Config::load_from_path(&path).await?;
        config.apply_to_settings(&mut settings)?;
    }

    settings.apply_env()?;
    settings.validate()?;
    Ok(settings)
}
