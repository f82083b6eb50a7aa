//! HTTP request handlers for the web server.

mod api;
mod search;

pub use api::health;
pub use search::{search_jobs, SearchParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
