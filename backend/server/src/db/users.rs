//! Accounts: donors, orphanages and admins.

use sqlx::SqlitePool;

use super::now;
use crate::errors::{AppError, Result};
use crate::models::{NewUser, UserRecord, UserRole};

const USER_COLUMNS: &str = "id, name, email, role, city, latitude, longitude, created_at";

pub async fn insert_user(pool: &SqlitePool, user: &NewUser, city: Option<&str>) -> Result<UserRecord> {
    let id = sqlx::query(
        r#"
        INSERT INTO users (name, email, role, city, latitude, longitude, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(user.name.trim())
    .bind(user.email.trim().to_lowercase())
    .bind(user.role.as_str())
    .bind(city)
    .bind(user.latitude)
    .bind(user.longitude)
    .bind(now())
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("email {} is already registered", user.email))
        }
        other => AppError::Database(other),
    })?
    .last_insert_rowid();

    get_user(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<UserRecord>> {
    let row = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Load a user and check they hold `role`.
pub async fn require_role(pool: &SqlitePool, id: i64, role: UserRole) -> Result<UserRecord> {
    let user = get_user(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
    if user.role()? != role {
        return Err(AppError::Forbidden(format!(
            "user {id} is a {}, not a {role}",
            user.role
        )));
    }
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool, role: Option<UserRole>) -> Result<Vec<UserRecord>> {
    let rows = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE ?1 IS NULL OR role = ?1 ORDER BY id ASC"
    ))
    .bind(role.map(|r| r.as_str()))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Remove a user together with everything they own (cascades).
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<bool> {
    let affected = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}
