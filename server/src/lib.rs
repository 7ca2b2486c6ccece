//! Bazaar HTTP Server Shell
//!
//! This is the thin application shell that wires configuration into the
//! search engine and exposes it over HTTP. Core business logic lives in the
//! `crates/` directory.

pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use bazaar_core::AppConfig;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use state::AppState;

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(routes::search))
        .route("/sources", get(routes::list_sources))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Build the engine from configuration and serve until the process is stopped.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Bazaar v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
