//! Resilient client for the upstream job search API.
//!
//! Requests are retried on rate limiting and transport failures with
//! jitter-free exponential backoff; raw listings are normalized before they
//! reach callers.

mod client;
mod error;
mod normalize;
mod query;
mod response;
mod retry;

pub use client::{
    AdzunaClient, UpstreamConfig, DEFAULT_BASE_URL, DEFAULT_COUNTRY, DEFAULT_TIMEOUT_SECS,
    USER_AGENT,
};
pub use error::{ClientBuildError, UpstreamError};
pub use normalize::{is_remote, normalize_job, normalize_job_at, REMOTE_KEYWORDS, UNKNOWN_COMPANY};
pub use query::{SearchQuery, SortBy, REMOTE_LOCATION};
pub use response::{RawCategory, RawCompany, RawJob, RawLocation, SearchResponse};
pub use retry::{
    RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES,
};
