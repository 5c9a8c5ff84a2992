//! Fundraisers and their own donation subcollection.

use donation_ledger::{self as ledger, Confirmation, FundraiserStatus};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::requests::Decision;
use super::{notify, now};
use crate::errors::{AppError, Result};
use crate::models::{FundraiserDonationRecord, FundraiserRecord, FundraiserView, NewFundraiser};
use crate::notifications::{NewNotification, NotificationKind};

const FUNDRAISER_COLUMNS: &str =
    "id, orphanage_id, title, description, target, raised, status, created_at";
const GIFT_COLUMNS: &str = "id, fundraiser_id, donor_id, amount, confirmation, created_at";

pub async fn insert_fundraiser(pool: &SqlitePool, new: &NewFundraiser) -> Result<FundraiserView> {
    let target = ledger::check_quantity(new.target.get())?;
    if new.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".to_string()));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO fundraisers (orphanage_id, title, description, target, raised, status, created_at)
        VALUES (?1, ?2, ?3, ?4, 0, 'active', ?5)
        "#,
    )
    .bind(new.orphanage_id)
    .bind(new.title.trim())
    .bind(&new.description)
    .bind(target)
    .bind(now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("Fundraiser {id} opened by orphanage {} for {target}", new.orphanage_id);
    get_fundraiser(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("fundraiser {id}")))
}

async fn fetch_fundraiser(conn: &mut SqliteConnection, id: i64) -> Result<Option<FundraiserRecord>> {
    let row = sqlx::query_as::<_, FundraiserRecord>(&format!(
        "SELECT {FUNDRAISER_COLUMNS} FROM fundraisers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

async fn fetch_gifts(conn: &mut SqliteConnection, fundraiser_id: i64) -> Result<Vec<FundraiserDonationRecord>> {
    let rows = sqlx::query_as::<_, FundraiserDonationRecord>(&format!(
        "SELECT {GIFT_COLUMNS} FROM fundraiser_donations WHERE fundraiser_id = ?1 ORDER BY id ASC"
    ))
    .bind(fundraiser_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

fn view(record: &FundraiserRecord, gifts: &[FundraiserDonationRecord]) -> Result<FundraiserView> {
    let fundraiser = record.to_fundraiser()?;
    let gifts = gifts
        .iter()
        .map(FundraiserDonationRecord::to_donation)
        .collect::<Result<Vec<_>>>()?;
    Ok(FundraiserView {
        progress: ledger::fundraiser_progress(&fundraiser, &gifts),
        fundraiser,
        created_at: record.created_at,
    })
}

pub async fn get_fundraiser(pool: &SqlitePool, id: i64) -> Result<Option<FundraiserView>> {
    let mut conn = pool.acquire().await?;
    let Some(record) = fetch_fundraiser(&mut conn, id).await? else {
        return Ok(None);
    };
    let gifts = fetch_gifts(&mut conn, id).await?;
    view(&record, &gifts).map(Some)
}

pub async fn list_fundraisers(pool: &SqlitePool, status: Option<FundraiserStatus>) -> Result<Vec<FundraiserView>> {
    let records = sqlx::query_as::<_, FundraiserRecord>(&format!(
        "SELECT {FUNDRAISER_COLUMNS} FROM fundraisers WHERE ?1 IS NULL OR status = ?1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    let mut conn = pool.acquire().await?;
    let mut views = Vec::with_capacity(records.len());
    for record in &records {
        let gifts = fetch_gifts(&mut conn, record.id).await?;
        views.push(view(record, &gifts)?);
    }
    Ok(views)
}

/// Record a pending money pledge to a fundraiser.
pub async fn pledge(
    pool: &SqlitePool,
    fundraiser_id: i64,
    donor_id: i64,
    amount: i64,
) -> Result<FundraiserDonationRecord> {
    let current = get_fundraiser(pool, fundraiser_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("fundraiser {fundraiser_id}")))?;
    ledger::validate_fundraiser_pledge(&current.fundraiser, amount)?;

    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        r#"
        INSERT INTO fundraiser_donations (fundraiser_id, donor_id, amount, confirmation, created_at)
        VALUES (?1, ?2, ?3, 'pending', ?4)
        "#,
    )
    .bind(fundraiser_id)
    .bind(donor_id)
    .bind(amount)
    .bind(now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    notify(
        &mut tx,
        &NewNotification::new(
            current.fundraiser.orphanage_id,
            NotificationKind::DonationReceived,
            id,
            format!("New pledge of {amount} to \"{}\"", current.fundraiser.title),
        ),
    )
    .await?;

    let record = sqlx::query_as::<_, FundraiserDonationRecord>(&format!(
        "SELECT {GIFT_COLUMNS} FROM fundraiser_donations WHERE id = ?1"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(record)
}

/// A fundraiser's gifts in pledge order, or `None` if it does not exist.
pub async fn gifts_for(pool: &SqlitePool, fundraiser_id: i64) -> Result<Option<Vec<FundraiserDonationRecord>>> {
    let mut conn = pool.acquire().await?;
    if fetch_fundraiser(&mut conn, fundraiser_id).await?.is_none() {
        return Ok(None);
    }
    fetch_gifts(&mut conn, fundraiser_id).await.map(Some)
}

/// Confirm a fundraiser pledge and recompute `raised`.
pub async fn confirm_pledge(
    pool: &SqlitePool,
    fundraiser_id: i64,
    gift_id: i64,
    orphanage_id: i64,
) -> Result<FundraiserView> {
    resolve_pledge(pool, fundraiser_id, gift_id, orphanage_id, Decision::Confirm).await
}

/// Decline a fundraiser pledge; it never counts towards `raised`.
pub async fn reject_pledge(
    pool: &SqlitePool,
    fundraiser_id: i64,
    gift_id: i64,
    orphanage_id: i64,
) -> Result<FundraiserView> {
    resolve_pledge(pool, fundraiser_id, gift_id, orphanage_id, Decision::Reject).await
}

/// Same shape as request confirmation: guarded write first, then a full
/// recount from confirmed gifts.
async fn resolve_pledge(
    pool: &SqlitePool,
    fundraiser_id: i64,
    gift_id: i64,
    orphanage_id: i64,
    decision: Decision,
) -> Result<FundraiserView> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        UPDATE fundraiser_donations
        SET    confirmation = ?3
        WHERE  id = ?1 AND fundraiser_id = ?2 AND confirmation = 'pending'
        "#,
    )
    .bind(gift_id)
    .bind(fundraiser_id)
    .bind(decision.confirmation().as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let gifts = fetch_gifts(&mut tx, fundraiser_id).await?;
    let Some(gift) = gifts.iter().find(|g| g.id == gift_id) else {
        return Err(AppError::NotFound(format!(
            "donation {gift_id} on fundraiser {fundraiser_id}"
        )));
    };
    if claimed == 0 {
        let mut current = gift.to_donation()?;
        match decision {
            Decision::Confirm => ledger::confirm_fundraiser_donation(&mut current)?,
            Decision::Reject => ledger::reject_fundraiser_donation(&mut current)?,
        }
        return Err(AppError::Conflict(format!("donation {gift_id} changed concurrently")));
    }

    let record = fetch_fundraiser(&mut tx, fundraiser_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("fundraiser {fundraiser_id}")))?;
    let fundraiser = record.to_fundraiser()?;
    if fundraiser.orphanage_id != orphanage_id {
        return Err(AppError::Forbidden(format!(
            "fundraiser {fundraiser_id} belongs to another orphanage"
        )));
    }

    let donations = gifts
        .iter()
        .map(FundraiserDonationRecord::to_donation)
        .collect::<Result<Vec<_>>>()?;
    let settled = ledger::settle_fundraiser(&fundraiser, &donations);

    sqlx::query("UPDATE fundraisers SET raised = ?1, status = ?2 WHERE id = ?3")
        .bind(settled.raised)
        .bind(settled.status.as_str())
        .bind(fundraiser_id)
        .execute(&mut *tx)
        .await?;

    let (kind, verb) = match decision {
        Decision::Confirm => (NotificationKind::DonationConfirmed, "confirmed"),
        Decision::Reject => (NotificationKind::DonationRejected, "declined"),
    };
    notify(
        &mut tx,
        &NewNotification::new(
            gift.donor_id,
            kind,
            gift_id,
            format!("Your gift to \"{}\" was {verb}", fundraiser.title),
        ),
    )
    .await?;
    if settled.newly_completed {
        notify(
            &mut tx,
            &NewNotification::new(
                fundraiser.orphanage_id,
                NotificationKind::FundraiserCompleted,
                fundraiser_id,
                format!("\"{}\" reached its target of {}", fundraiser.title, fundraiser.target),
            ),
        )
        .await?;
        info!("Fundraiser {fundraiser_id} completed at {}", settled.raised);
    }
    info!("Fundraiser {fundraiser_id} gift {gift_id} {verb}");

    let after = fetch_fundraiser(&mut tx, fundraiser_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("fundraiser {fundraiser_id}")))?;
    let result = view(&after, &gifts)?;
    tx.commit().await?;
    Ok(result)
}

/// Count of confirmed gifts, used by the admin report.
pub async fn confirmed_gift_count(pool: &SqlitePool) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM fundraiser_donations WHERE confirmation = ?1",
    )
    .bind(Confirmation::Confirmed.as_str())
    .fetch_one(pool)
    .await?;
    Ok(n)
}
