//! jobgate - admission control and resilient fetching for a job search API.
//!
//! Inbound requests pass a sliding window rate limiter backed by a shared
//! counter store; admitted searches go to the upstream API through a client
//! that retries transient failures with exponential backoff.

pub mod cli;
pub mod config;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod sanitize;
pub mod schema;
pub mod server;
pub mod upstream;
