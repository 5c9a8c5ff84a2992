//! Orphan Aid API entry point.
//!
//! Serves the donation platform's REST API over SQLite and runs a
//! background task that clears out long-fulfilled requests.

mod api;
mod cleanup;
mod config;
mod db;
mod errors;
mod geocode;
mod models;
mod notifications;
mod payment;

#[cfg(test)]
mod test_donations;

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cleanup::CleanupState;
use config::Config;
use geocode::Geocoder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = db::init_pool(&config.database_url).await?;

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.geocode_timeout_secs))
        .build()?;

    // ─── Background cleanup ───────────────────────────────
    let shutdown = CancellationToken::new();
    let cleanup_state = Arc::new(CleanupState {
        pool: pool.clone(),
        config: config.clone(),
    });
    let cleanup_task = tokio::spawn(cleanup::run(cleanup_state, shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        pool,
        geocoder: Geocoder::new(client, config.geocode_url.clone()),
        config: config.clone(),
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let stop = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            stop.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = cleanup_task.await;
    Ok(())
}
