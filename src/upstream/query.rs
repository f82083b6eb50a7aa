//! Outbound search query and its wire parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Location sent when the caller asks for remote jobs only.
pub const REMOTE_LOCATION: &str = "remote";

/// Result ordering requested from the upstream API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Date,
    #[default]
    Relevance,
    Salary,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Date => "date",
            SortBy::Relevance => "relevance",
            SortBy::Salary => "salary",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(SortBy::Date),
            "relevance" => Ok(SortBy::Relevance),
            "salary" => Ok(SortBy::Salary),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// One upstream search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub what: String,
    pub location: String,
    /// Replaces `location` with [`REMOTE_LOCATION`].
    pub remote: bool,
    /// 1-based page number.
    pub page: u32,
    pub results_per_page: u32,
    pub sort_by: SortBy,
    pub category: Option<String>,
    pub salary_min: Option<u64>,
    pub salary_max: Option<u64>,
    pub full_time: Option<bool>,
    pub part_time: Option<bool>,
    pub contract: Option<bool>,
    pub permanent: Option<bool>,
    pub max_days_old: Option<u32>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            what: String::new(),
            location: String::new(),
            remote: false,
            page: 1,
            results_per_page: 10,
            sort_by: SortBy::default(),
            category: None,
            salary_min: None,
            salary_max: None,
            full_time: None,
            part_time: None,
            contract: None,
            permanent: None,
            max_days_old: None,
        }
    }
}

impl SearchQuery {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            ..Self::default()
        }
    }

    /// Location parameter actually sent upstream.
    pub fn effective_location(&self) -> &str {
        if self.remote {
            REMOTE_LOCATION
        } else {
            &self.location
        }
    }

    /// Query parameters excluding credentials, in wire order.
    ///
    /// Zero numeric filters and empty categories are left out because the
    /// upstream treats them as unset.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("results_per_page", self.results_per_page.to_string()),
            ("what", self.what.clone()),
            ("where", self.effective_location().to_string()),
            ("sort_by", self.sort_by.as_str().to_string()),
        ];

        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(min) = self.salary_min.filter(|v| *v > 0) {
            pairs.push(("salary_min", min.to_string()));
        }
        if let Some(max) = self.salary_max.filter(|v| *v > 0) {
            pairs.push(("salary_max", max.to_string()));
        }

        let flags = [
            ("full_time", self.full_time),
            ("part_time", self.part_time),
            ("contract", self.contract),
            ("permanent", self.permanent),
        ];
        for (name, flag) in flags {
            if let Some(flag) = flag {
                pairs.push((name, if flag { "1" } else { "0" }.to_string()));
            }
        }

        if let Some(days) = self.max_days_old.filter(|v| *v > 0) {
            pairs.push(("max_days_old", days.to_string()));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair<'a>(pairs: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_required_pairs_in_order() {
        let query = SearchQuery {
            location: "Austin".into(),
            ..SearchQuery::new("rust developer")
        };
        let pairs = query.query_pairs();
        let names: Vec<_> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, vec!["results_per_page", "what", "where", "sort_by"]);
        assert_eq!(pair(&pairs, "what"), Some("rust developer"));
        assert_eq!(pair(&pairs, "where"), Some("Austin"));
        assert_eq!(pair(&pairs, "sort_by"), Some("relevance"));
    }

    #[test]
    fn test_remote_replaces_location() {
        let query = SearchQuery {
            location: "Austin".into(),
            remote: true,
            ..SearchQuery::default()
        };
        assert_eq!(pair(&query.query_pairs(), "where"), Some("remote"));
    }

    #[test]
    fn test_optional_filters() {
        let query = SearchQuery {
            category: Some("it-jobs".into()),
            salary_min: Some(50_000),
            salary_max: Some(0),
            full_time: Some(true),
            permanent: Some(false),
            max_days_old: Some(7),
            ..SearchQuery::default()
        };
        let pairs = query.query_pairs();
        assert_eq!(pair(&pairs, "category"), Some("it-jobs"));
        assert_eq!(pair(&pairs, "salary_min"), Some("50000"));
        assert_eq!(pair(&pairs, "salary_max"), None);
        assert_eq!(pair(&pairs, "full_time"), Some("1"));
        assert_eq!(pair(&pairs, "part_time"), None);
        assert_eq!(pair(&pairs, "permanent"), Some("0"));
        assert_eq!(pair(&pairs, "max_days_old"), Some("7"));
    }

    #[test]
    fn test_sort_by_parse() {
        assert_eq!("DATE".parse::<SortBy>(), Ok(SortBy::Date));
        assert!("newest".parse::<SortBy>().is_err());
    }
}
