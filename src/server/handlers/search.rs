//! Job search endpoint.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, error};

use super::super::AppState;
use crate::models::SearchPage;
use crate::rate_limit::{authenticated_user, client_identifier};
use crate::upstream::{normalize_job, SearchQuery, SortBy};

/// Page size used when `limit` is absent or unparseable.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size forwarded upstream.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Query string of `/api/jobs/search`. Numbers arrive as text so bad values
/// fall back to defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub location: Option<String>,
    pub remote: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    pub fn page(&self) -> u32 {
        parse_positive(self.page.as_deref()).unwrap_or(1)
    }

    /// Requested page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn per_page(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn is_remote(&self) -> bool {
        self.remote.as_deref() == Some("true")
    }

    pub fn to_query(&self) -> SearchQuery {
        SearchQuery {
            what: self.query.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            remote: self.is_remote(),
            page: self.page(),
            results_per_page: self.per_page(),
            sort_by: SortBy::Date,
            ..SearchQuery::default()
        }
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
}

/// Search jobs behind both admission tiers.
pub async fn search_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let client = client_identifier(&headers);
    let user = authenticated_user(&headers, &state.user_header);

    if let Err(rejected) = state.admission.gate(&client, user.as_deref()).await {
        return rejected.into_response();
    }

    let query = params.to_query();
    debug!(
        what = %query.what,
        remote = query.remote,
        page = query.page,
        per_page = query.results_per_page,
        "Searching jobs"
    );

    match state.client.search(&query).await {
        Ok(response) => {
            let jobs = response.results.iter().map(normalize_job).collect();
            let page = SearchPage::new(jobs, response.count, query.page, query.results_per_page);
            Json(serde_json::json!({
                "success": true,
                "data": page,
            }))
            .into_response()
        }
        Err(e) => {
            error!("Job search error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Failed to search jobs",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> SearchParams {
        SearchParams {
            page: page.map(String::from),
            limit: limit.map(String::from),
            ..SearchParams::default()
        }
    }

    #[test]
    fn test_defaults() {
        let p = SearchParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), 10);
        assert!(!p.is_remote());
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(params(None, Some("500")).per_page(), 50);
        assert_eq!(params(None, Some("0")).per_page(), 1);
        assert_eq!(params(None, Some("abc")).per_page(), 10);
        assert_eq!(params(Some("-3"), None).page(), 1);
        assert_eq!(params(Some("4"), None).page(), 4);
    }

    #[test]
    fn test_to_query() {
        let p = SearchParams {
            query: Some("rust".into()),
            location: Some("Austin".into()),
            remote: Some("true".into()),
            ..SearchParams::default()
        };
        let q = p.to_query();
        assert_eq!(q.what, "rust");
        assert!(q.remote);
        assert_eq!(q.effective_location(), "remote");
        assert_eq!(q.sort_by, SortBy::Date);
    }
}
