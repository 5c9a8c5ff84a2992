//! Database layer: pool setup, migrations and typed queries per table.
//!
//! Every multi-statement mutation runs in one transaction whose first
//! statement is a write, so SQLite hands the transaction its write lock
//! before anything is read.  Concurrent confirmations therefore queue on
//! the lock instead of interleaving their read-modify-write cycles.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::notifications::NewNotification;

pub mod fundraisers;
pub mod messages;
pub mod payments;
pub mod reports;
pub mod requests;
pub mod services;
pub mod users;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    // Each connection to `:memory:` opens its own empty database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Queue a notification on the caller's connection (usually a transaction).
pub async fn notify(conn: &mut SqliteConnection, n: &NewNotification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, subject_id, message, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(n.user_id)
    .bind(n.kind.as_str())
    .bind(n.subject_id)
    .bind(&n.message)
    .bind(now())
    .execute(conn)
    .await?;
    Ok(())
}
