//! Web server exposing the rate limited job search API.
//!
//! Every search passes the admission gate (IP tier, then user tier) before
//! the upstream client is called.

mod handlers;
mod routes;

pub use handlers::{SearchParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use routes::{create_router, SECURITY_HEADERS};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::rate_limit::{open_store, Admission, SlidingWindowLimiter};
use crate::upstream::AdzunaClient;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub admission: Admission,
    pub client: AdzunaClient,
    /// Header carrying the authenticated user id.
    pub user_header: Arc<str>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let rl = &settings.rate_limit;
        let ip_config = rl.ip_config()?;
        let user_config = rl.user_config()?;

        let store = open_store(&rl.backend, &settings.database_url).await?;
        let limiter = SlidingWindowLimiter::new(store, ip_config);
        let admission = Admission::new(limiter, ip_config, user_config, rl.on_store_error);

        if !settings.upstream.has_credentials() {
            tracing::warn!("ADZUNA_APP_ID / ADZUNA_APP_KEY not set; upstream searches will fail");
        }
        let client = AdzunaClient::new(&settings.upstream)?;

        Ok(Self::from_parts(admission, client, &settings.user_header))
    }

    pub fn from_parts(admission: Admission, client: AdzunaClient, user_header: &str) -> Self {
        Self {
            admission,
            client,
            user_header: Arc::from(user_header.to_ascii_lowercase()),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!(
        backend = %settings.rate_limit.backend,
        on_store_error = %settings.rate_limit.on_store_error,
        "Starting server at http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
