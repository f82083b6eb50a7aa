//! Normalized job listings as served to clients.

use serde::{Deserialize, Serialize};

/// A job listing after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub is_remote: bool,
    /// Sanitized description markup.
    pub description_html: String,
    pub apply_url: String,
    /// RFC 3339 posting time.
    pub posted_at: String,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub jobs: Vec<JobListing>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl SearchPage {
    /// Build a page, deriving `total_pages` from `total` and `per_page`.
    pub fn new(jobs: Vec<JobListing>, total: u64, page: u32, per_page: u32) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page))
        };
        Self {
            jobs,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
