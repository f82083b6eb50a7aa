//! Mapping raw upstream listings onto [`JobListing`].

use chrono::{DateTime, SecondsFormat, Utc};

use super::response::RawJob;
use crate::models::JobListing;
use crate::sanitize::sanitize_html;

/// Substrings marking a listing as remote.
pub const REMOTE_KEYWORDS: &[&str] = &["remote", "work from home", "distributed"];

/// Company shown when the upstream omits one.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// Normalize a listing, stamping missing posting dates with the current time.
pub fn normalize_job(raw: &RawJob) -> JobListing {
    normalize_job_at(raw, Utc::now())
}

/// Normalize a listing with an explicit fallback posting time.
pub fn normalize_job_at(raw: &RawJob, now: DateTime<Utc>) -> JobListing {
    let location = raw
        .location
        .as_ref()
        .and_then(|l| l.display_name.clone())
        .unwrap_or_default();
    let title = raw.title.clone().unwrap_or_default();
    let description = raw.description.as_deref().unwrap_or_default();

    let is_remote = is_remote(&location, &title, description);

    JobListing {
        id: raw.id.clone(),
        company: raw
            .company
            .as_ref()
            .and_then(|c| c.display_name.clone())
            .unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
        description_html: sanitize_html(description),
        apply_url: raw.redirect_url.clone().unwrap_or_default(),
        posted_at: raw
            .created
            .clone()
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        is_remote,
        location,
        title,
    }
}

/// Case-insensitive keyword match over location, title and raw description.
pub fn is_remote(location: &str, title: &str, description: &str) -> bool {
    let haystack = [location, title, description]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    REMOTE_KEYWORDS.iter().any(|keyword| haystack.contains(keyword))
}
