//! Service requests and the single offer that settles each one.

use donation_ledger::{ServiceAction, ServiceStatus};
use sqlx::SqlitePool;
use tracing::info;

use super::{notify, now};
use crate::errors::{AppError, Result};
use crate::models::ServiceRecord;
use crate::notifications::{NewNotification, NotificationKind};

const SERVICE_COLUMNS: &str =
    "id, orphanage_id, title, description, status, donor_id, offer_note, created_at, updated_at";

pub async fn insert_service(
    pool: &SqlitePool,
    orphanage_id: i64,
    title: &str,
    description: &str,
) -> Result<ServiceRecord> {
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".to_string()));
    }
    let ts = now();
    let id = sqlx::query(
        r#"
        INSERT INTO services (orphanage_id, title, description, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, 'pending', ?4, ?4)
        "#,
    )
    .bind(orphanage_id)
    .bind(title.trim())
    .bind(description)
    .bind(ts)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_service(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))
}

pub async fn get_service(pool: &SqlitePool, id: i64) -> Result<Option<ServiceRecord>> {
    let row = sqlx::query_as::<_, ServiceRecord>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_services(pool: &SqlitePool, status: Option<ServiceStatus>) -> Result<Vec<ServiceRecord>> {
    let rows = sqlx::query_as::<_, ServiceRecord>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE ?1 IS NULL OR status = ?1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A donor offers to provide a pending service.  Only one offer may stand.
pub async fn offer(pool: &SqlitePool, id: i64, donor_id: i64, note: Option<&str>) -> Result<ServiceRecord> {
    let mut tx = pool.begin().await?;
    let claimed = sqlx::query(
        r#"
        UPDATE services
        SET    donor_id = ?1, offer_note = ?2, updated_at = ?3
        WHERE  id = ?4 AND status = 'pending' AND donor_id IS NULL
        "#,
    )
    .bind(donor_id)
    .bind(note)
    .bind(now())
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let record = sqlx::query_as::<_, ServiceRecord>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;

    if claimed == 0 {
        return Err(AppError::Conflict(format!(
            "service {id} is {} and already has an offer or is closed",
            record.status
        )));
    }

    notify(
        &mut tx,
        &NewNotification::new(
            record.orphanage_id,
            NotificationKind::ServiceOffered,
            id,
            format!("A donor offered to provide \"{}\"", record.title),
        ),
    )
    .await?;
    tx.commit().await?;

    info!("Donor {donor_id} offered service {id}");
    Ok(record)
}

/// Move a service through its lifecycle on behalf of its orphanage.
///
/// The write is conditioned on the status we validated against, so two
/// racing updates cannot both apply.
pub async fn transition(
    pool: &SqlitePool,
    id: i64,
    orphanage_id: i64,
    action: ServiceAction,
) -> Result<ServiceRecord> {
    let record = get_service(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;
    if record.orphanage_id != orphanage_id {
        return Err(AppError::Forbidden(format!("service {id} belongs to another orphanage")));
    }

    let from = record.to_service()?.status;
    let to = from.apply(action)?;
    if action == ServiceAction::Accept && record.donor_id.is_none() {
        return Err(AppError::Conflict(format!("service {id} has no offer to accept")));
    }

    let mut tx = pool.begin().await?;
    let applied = sqlx::query(
        "UPDATE services SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
    )
    .bind(to.as_str())
    .bind(now())
    .bind(id)
    .bind(from.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if applied == 0 {
        return Err(AppError::Conflict(format!("service {id} changed concurrently")));
    }

    if let Some(donor_id) = record.donor_id {
        notify(
            &mut tx,
            &NewNotification::new(
                donor_id,
                NotificationKind::ServiceUpdated,
                id,
                format!("\"{}\" is now {to}", record.title),
            ),
        )
        .await?;
    }
    tx.commit().await?;

    info!("Service {id}: {from} -> {to}");
    get_service(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))
}
