//! Long-running background task that deletes requests which were fulfilled
//! longer ago than the retention window.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{Config, RETENTION_DAYS_RANGE};
use crate::db;
use crate::errors::{AppError, Result};

pub struct CleanupState {
    pub pool: SqlitePool,
    pub config: Config,
}

/// Run the cleanup loop until `shutdown` is cancelled.
pub async fn run(state: Arc<CleanupState>, shutdown: CancellationToken) {
    info!(
        "Cleanup starting: every {}s, retaining fulfilled requests for {} days",
        state.config.cleanup_interval_secs, state.config.fulfilled_retention_days
    );

    loop {
        match sweep_once(&state.pool, state.config.fulfilled_retention_days).await {
            Ok(0) => {}
            Ok(n) => info!("Cleanup removed {n} stale fulfilled requests"),
            Err(e) => error!("Cleanup sweep error: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(state.config.cleanup_interval_secs)) => {}
        }
    }

    info!("Cleanup stopped");
}

/// Perform a single sweep.  Returns the number of requests deleted.
pub async fn sweep_once(pool: &SqlitePool, retention_days: i64) -> Result<u64> {
    let cutoff = cutoff(chrono::Utc::now().timestamp(), retention_days)?;
    db::requests::delete_stale_fulfilled(pool, cutoff).await
}

/// Unix time before which fulfilled requests count as stale.
fn cutoff(now: i64, retention_days: i64) -> Result<i64> {
    if !RETENTION_DAYS_RANGE.contains(&retention_days) {
        return Err(AppError::Config(format!(
            "retention of {retention_days} days is out of range"
        )));
    }
    Ok(now - retention_days * 86_400)
}
