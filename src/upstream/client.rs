//! Retrying Adzuna search client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use tracing::{debug, warn};
use url::Url;

use super::error::{ClientBuildError, UpstreamError};
use super::query::SearchQuery;
use super::response::SearchResponse;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

pub const USER_AGENT: &str = concat!("jobgate/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_BASE_URL: &str = "https://api.adzuna.com";
pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the upstream API.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub app_id: String,
    pub app_key: String,
    pub country: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_key: String::new(),
            country: DEFAULT_COUNTRY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("app_id", &self.app_id)
            .field("app_key", &"<redacted>")
            .field("country", &self.country)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn has_credentials(&self) -> bool {
        !self.app_id.is_empty() && !self.app_key.is_empty()
    }
}

/// Failure worth another attempt.
#[derive(Debug)]
struct TransientFailure {
    status: Option<u16>,
    message: String,
}

enum AttemptOutcome {
    Done(Result<SearchResponse, UpstreamError>),
    Retry(TransientFailure),
}

/// Adzuna search client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct AdzunaClient {
    http: Client,
    base_url: Url,
    app_id: String,
    app_key: String,
    country: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AdzunaClient {
    /// Create a client that sleeps on the tokio timer between attempts.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientBuildError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientBuildError::InvalidBaseUrl(format!(
                "{} is not an http(s) URL",
                config.base_url
            )));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            base_url,
            app_id: config.app_id.clone(),
            app_key: config.app_key.clone(),
            country: config.country.clone(),
            retry: config.retry_policy(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Search the upstream API, retrying rate limits and transport failures.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, UpstreamError> {
        let url = self.search_url(query);
        let max_attempts = self.retry.max_attempts();
        let mut last_failure = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.retry.delay_before(attempt);
                debug!(attempt, ?delay, "Waiting before retrying Adzuna search");
                self.sleeper.sleep(delay).await;
            }

            match self.attempt(&url).await {
                AttemptOutcome::Done(result) => return result,
                AttemptOutcome::Retry(failure) => {
                    warn!(
                        attempt,
                        max_attempts,
                        status = failure.status,
                        "Adzuna search failed: {}",
                        failure.message
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let (status, message) = match last_failure {
            Some(f) => (f.status, f.message),
            None => (None, "no attempts made".to_string()),
        };
        Err(UpstreamError::Unavailable {
            attempts: max_attempts,
            status,
            message,
        })
    }

    /// Full request URL for a query, credentials included.
    pub fn search_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.base_url.clone();
        let page = query.page.to_string();
        // Checked in `new`: the base URL can carry path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "v1",
                "api",
                "jobs",
                self.country.as_str(),
                "search",
                page.as_str(),
            ]);
        }
        url.query_pairs_mut()
            .append_pair("app_id", &self.app_id)
            .append_pair("app_key", &self.app_key)
            .extend_pairs(query.query_pairs());
        url
    }

    async fn attempt(&self, url: &Url) -> AttemptOutcome {
        let response = match self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::Retry(TransientFailure {
                    status: None,
                    message: e.without_url().to_string(),
                })
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return AttemptOutcome::Retry(TransientFailure {
                status: Some(status.as_u16()),
                message: format!("Adzuna API error: {}", status),
            });
        }
        if !status.is_success() {
            return AttemptOutcome::Done(Err(UpstreamError::Rejected {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            }));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return AttemptOutcome::Retry(TransientFailure {
                    status: Some(status.as_u16()),
                    message: format!("failed to read response body: {}", e.without_url()),
                })
            }
        };

        match serde_json::from_slice::<SearchResponse>(&body) {
            Ok(parsed) => AttemptOutcome::Done(Ok(parsed)),
            Err(e) if e.classify() == Category::Data => {
                AttemptOutcome::Done(Err(UpstreamError::MalformedResponse(e.to_string())))
            }
            Err(e) => AttemptOutcome::Retry(TransientFailure {
                status: Some(status.as_u16()),
                message: format!("response body is not JSON: {}", e),
            }),
        }
    }
}
