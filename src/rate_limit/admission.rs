//! Admission gate composing identity resolution with the limiter.
//!
//! Each request is checked against an IP-scoped tier and, when the caller is
//! authenticated, a user-scoped tier. The first tier to reject short-circuits.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use super::config::{RateLimitConfig, StoreFailurePolicy};
use super::limiter::SlidingWindowLimiter;
use super::store::{StoreError, StoreResult};

/// Context for the network-identity tier.
pub const IP_CONTEXT: &str = "jobs:ip";

/// Context for the authenticated-user tier.
pub const USER_CONTEXT: &str = "jobs:user";

/// Seconds until `reset_at`, rounded up and never negative.
pub fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining_ms = (reset_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    remaining_ms.div_euclid(1000) as u64 + u64::from(remaining_ms % 1000 != 0)
}

/// A request refused by the limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub context: String,
    pub reset_at: DateTime<Utc>,
    pub retry_after_secs: u64,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionBody {
    error: &'static str,
    reset_at: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            error: "Too many requests",
            reset_at: self.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        response
    }
}

/// Why a request was not admitted.
#[derive(Debug)]
pub enum AdmissionError {
    Limited(Rejection),
    /// The counter store failed under [`StoreFailurePolicy::FailClosed`].
    StoreUnavailable(StoreError),
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        match self {
            AdmissionError::Limited(rejection) => rejection.into_response(),
            AdmissionError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Rate limiter unavailable" })),
            )
                .into_response(),
        }
    }
}

/// Per-tier limits and the store failure policy applied by [`Admission::gate`].
#[derive(Clone)]
pub struct Admission {
    limiter: SlidingWindowLimiter,
    ip_config: RateLimitConfig,
    user_config: RateLimitConfig,
    on_store_error: StoreFailurePolicy,
}

impl Admission {
    pub fn new(
        limiter: SlidingWindowLimiter,
        ip_config: RateLimitConfig,
        user_config: RateLimitConfig,
        on_store_error: StoreFailurePolicy,
    ) -> Self {
        Self {
            limiter,
            ip_config,
            user_config,
            on_store_error,
        }
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }

    /// Evaluate one tier. `None` means proceed.
    ///
    /// Falls back to the limiter defaults when `config` is omitted. Store
    /// failures are returned unchanged.
    pub async fn admit(
        &self,
        identifier: &str,
        context: &str,
        config: Option<&RateLimitConfig>,
    ) -> StoreResult<Option<Rejection>> {
        let config = config.unwrap_or_else(|| self.limiter.defaults());
        let decision = self.limiter.evaluate(identifier, context, config).await?;
        if decision.allowed {
            return Ok(None);
        }

        let now = self.limiter.clock().now();
        let rejection = Rejection {
            context: context.to_string(),
            reset_at: decision.reset_at,
            retry_after_secs: retry_after_secs(decision.reset_at, now),
        };
        info!(
            identifier,
            context,
            retry_after = rejection.retry_after_secs,
            "Request rate limited"
        );
        Ok(Some(rejection))
    }

    /// Run the IP tier, then the user tier when `user` is present.
    pub async fn gate(&self, client: &str, user: Option<&str>) -> Result<(), AdmissionError> {
        self.tier(client, IP_CONTEXT, &self.ip_config).await?;
        if let Some(user) = user {
            self.tier(user, USER_CONTEXT, &self.user_config).await?;
        }
        Ok(())
    }

    async fn tier(
        &self,
        identifier: &str,
        context: &str,
        config: &RateLimitConfig,
    ) -> Result<(), AdmissionError> {
        match self.admit(identifier, context, Some(config)).await {
            Ok(None) => Ok(()),
            Ok(Some(rejection)) => Err(AdmissionError::Limited(rejection)),
            Err(e) => match self.on_store_error {
                StoreFailurePolicy::FailClosed => {
                    warn!(context, error = %e, "Rate limiter store failed, rejecting request");
                    Err(AdmissionError::StoreUnavailable(e))
                }
                StoreFailurePolicy::FailOpen => {
                    warn!(context, error = %e, "Rate limiter store failed, admitting request");
                    Ok(())
                }
            },
        }
    }
}
