//! Data models for jobgate.

mod listing;

pub use listing::{JobListing, SearchPage};
