//! Upstream client error types.

use thiserror::Error;

/// Failure of one upstream search.
///
/// Messages carry status codes or underlying error text only, never the
/// request URL (which holds the API credentials).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Non-retryable non-2xx response.
    #[error("Adzuna API error: {status} {status_text}")]
    Rejected { status: u16, status_text: String },

    /// Retries exhausted on rate limiting or transport failures.
    #[error("Adzuna API unavailable after {attempts} attempts: {message}")]
    Unavailable {
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    /// Body was valid JSON but not a search response.
    #[error("Malformed Adzuna response: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// HTTP status of the last upstream response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Rejected { status, .. } => Some(*status),
            UpstreamError::Unavailable { status, .. } => *status,
            UpstreamError::MalformedResponse(_) => None,
        }
    }
}

/// The client could not be constructed from its configuration.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid Adzuna base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
