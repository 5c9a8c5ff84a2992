//! Requests, their donations, and the confirmation path that keeps the
//! two consistent.

use std::collections::HashMap;

use donation_ledger::{self as ledger, Confirmation, Contribution, PledgeForm, Request, RequestStatus};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use super::{notify, now};
use crate::errors::{AppError, Result};
use crate::models::{DonationRecord, NewRequest, RequestFilter, RequestRecord, RequestView, Resolution};
use crate::notifications::{NewNotification, NotificationKind};

const REQUEST_COLUMNS: &str = "id, orphanage_id, kind, title, description, city, target, \
                               subtypes, status, donated, created_at, fulfilled_at";

/// Browser filter over `requests`; binds city, kind, status, orphanage.
const BROWSE_FILTER: &str = "(?1 IS NULL OR city = ?1 COLLATE NOCASE) \
                             AND (?2 IS NULL OR kind = ?2) \
                             AND (?3 IS NULL OR status = ?3) \
                             AND (?4 IS NULL OR orphanage_id = ?4)";

const DONATION_COLUMNS: &str =
    "id, donor_id, request_id, kind, quantity, items, confirmation, created_at, resolved_at";

/// Which way an orphanage (or the payment handler) settles a pledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Reject,
}

impl Decision {
    pub(crate) fn confirmation(self) -> Confirmation {
        match self {
            Decision::Confirm => Confirmation::Confirmed,
            Decision::Reject => Confirmation::Rejected,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────

/// Persist a validated request.  `city` is resolved by the caller.
pub async fn insert_request(pool: &SqlitePool, new: &NewRequest, city: &str) -> Result<RequestRecord> {
    let draft = Request {
        id: 0,
        orphanage_id: new.orphanage_id,
        kind: new.kind,
        title: new.title.trim().to_string(),
        description: new.description.clone(),
        city: city.to_string(),
        target: new.target,
        subtypes: new.subtypes.clone(),
        status: RequestStatus::Pending,
        donated: 0,
    };
    ledger::validate_request(&draft)?;
    if draft.title.is_empty() {
        return Err(AppError::BadRequest("title is required".to_string()));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO requests
            (orphanage_id, kind, title, description, city, target, subtypes, status, donated, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 0, ?8)
        "#,
    )
    .bind(draft.orphanage_id)
    .bind(draft.kind.as_str())
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.city)
    .bind(draft.target)
    .bind(serde_json::to_string(&draft.subtypes)?)
    .bind(now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("Request {id} created by orphanage {}", draft.orphanage_id);
    let mut conn = pool.acquire().await?;
    fetch_request(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("request {id}")))
}

async fn fetch_request(conn: &mut SqliteConnection, id: i64) -> Result<Option<RequestRecord>> {
    let row = sqlx::query_as::<_, RequestRecord>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

async fn fetch_donations(conn: &mut SqliteConnection, request_id: i64) -> Result<Vec<DonationRecord>> {
    let rows = sqlx::query_as::<_, DonationRecord>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE request_id = ?1 ORDER BY id ASC"
    ))
    .bind(request_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Pair a request with progress recomputed from its confirmed donations.
fn view(record: &RequestRecord, donations: &[DonationRecord]) -> Result<RequestView> {
    let request = record.to_request()?;
    let donations = donations
        .iter()
        .map(DonationRecord::to_donation)
        .collect::<Result<Vec<_>>>()?;
    Ok(RequestView {
        progress: ledger::progress(&request, &donations),
        request,
        created_at: record.created_at,
        fulfilled_at: record.fulfilled_at,
    })
}

pub async fn get_request(pool: &SqlitePool, id: i64) -> Result<Option<RequestView>> {
    let mut conn = pool.acquire().await?;
    let Some(record) = fetch_request(&mut conn, id).await? else {
        return Ok(None);
    };
    let donations = fetch_donations(&mut conn, id).await?;
    view(&record, &donations).map(Some)
}

/// The request browser: filter by city/kind/status and attach progress.
///
/// Confirmed donations for the matching requests are loaded in one pass and
/// grouped by request; unreadable rows are skipped.
pub async fn list_requests(pool: &SqlitePool, filter: &RequestFilter) -> Result<Vec<RequestView>> {
    let records = sqlx::query_as::<_, RequestRecord>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE {BROWSE_FILTER} ORDER BY created_at DESC, id DESC"
    ))
    .bind(filter.city.as_deref().map(str::trim))
    .bind(filter.kind.map(|k| k.as_str()))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.orphanage_id)
    .fetch_all(pool)
    .await?;

    let confirmed = sqlx::query_as::<_, DonationRecord>(&format!(
        r#"
        SELECT {DONATION_COLUMNS}
        FROM   donations
        WHERE  confirmation = 'confirmed'
          AND  request_id IN (SELECT id FROM requests WHERE {BROWSE_FILTER})
        ORDER  BY request_id, id
        "#
    ))
    .bind(filter.city.as_deref().map(str::trim))
    .bind(filter.kind.map(|k| k.as_str()))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.orphanage_id)
    .fetch_all(pool)
    .await?;

    let mut by_request: HashMap<i64, Vec<DonationRecord>> = HashMap::new();
    for donation in confirmed {
        by_request.entry(donation.request_id).or_default().push(donation);
    }

    let mut views = Vec::with_capacity(records.len());
    for record in &records {
        let own = by_request.get(&record.id).map(Vec::as_slice).unwrap_or_default();
        match view(record, own) {
            Ok(v) => views.push(v),
            Err(e) => warn!("Skipping unreadable request {}: {e}", record.id),
        }
    }
    Ok(views)
}

/// Delete a request (and, by cascade, its donations).  Only the owning
/// orphanage may delete; `None` skips the check for admins.
pub async fn delete_request(pool: &SqlitePool, id: i64, owner: Option<i64>) -> Result<bool> {
    let affected = sqlx::query("DELETE FROM requests WHERE id = ?1 AND (?2 IS NULL OR orphanage_id = ?2)")
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?
        .rows_affected();
    if affected == 0 && owner.is_some() {
        let mut conn = pool.acquire().await?;
        if fetch_request(&mut conn, id).await?.is_some() {
            return Err(AppError::Forbidden(format!("request {id} belongs to another orphanage")));
        }
    }
    Ok(affected > 0)
}

/// Delete fulfilled requests whose `fulfilled_at` is before `cutoff`.
pub async fn delete_stale_fulfilled(pool: &SqlitePool, cutoff: i64) -> Result<u64> {
    let affected = sqlx::query(
        "DELETE FROM requests WHERE status = 'fulfilled' AND fulfilled_at IS NOT NULL AND fulfilled_at < ?1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected)
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

pub async fn get_donation(pool: &SqlitePool, id: i64) -> Result<Option<DonationRecord>> {
    let mut conn = pool.acquire().await?;
    fetch_donation(&mut conn, id).await
}

pub(crate) async fn fetch_donation(conn: &mut SqliteConnection, id: i64) -> Result<Option<DonationRecord>> {
    let row = sqlx::query_as::<_, DonationRecord>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn donations_for_request(pool: &SqlitePool, request_id: i64) -> Result<Vec<DonationRecord>> {
    let mut conn = pool.acquire().await?;
    fetch_donations(&mut conn, request_id).await
}

/// Donation history for the donor dashboard, newest first.
pub async fn donations_by_donor(pool: &SqlitePool, donor_id: i64) -> Result<Vec<DonationRecord>> {
    let rows = sqlx::query_as::<_, DonationRecord>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE donor_id = ?1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(donor_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Record a pending pledge after checking it against the remaining need.
///
/// Only confirmed donations count toward the need, so validation reads
/// outside the write transaction; the insert and the orphanage's
/// notification commit together.
pub async fn submit_donation(
    pool: &SqlitePool,
    donor_id: i64,
    request_id: i64,
    form: &PledgeForm,
) -> Result<DonationRecord> {
    let current = get_request(pool, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("request {request_id}")))?;
    let request = &current.request;

    let contribution = form.contribution(request)?;
    ledger::validate_pledge(request, &current.progress, &contribution)?;

    let items = match &contribution {
        Contribution::Items(items) => Some(serde_json::to_string(items)?),
        Contribution::Units(_) => None,
    };

    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        r#"
        INSERT INTO donations (donor_id, request_id, kind, quantity, items, confirmation, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
        "#,
    )
    .bind(donor_id)
    .bind(request_id)
    .bind(request.kind.as_str())
    .bind(contribution.total())
    .bind(items)
    .bind(now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    notify(
        &mut tx,
        &NewNotification::new(
            request.orphanage_id,
            NotificationKind::DonationReceived,
            id,
            format!(
                "New {} pledge of {} for \"{}\"",
                request.kind,
                contribution.total(),
                request.title
            ),
        ),
    )
    .await?;

    let record = fetch_donation(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("donation {id}")))?;
    tx.commit().await?;

    info!("Donation {id} pledged by donor {donor_id} to request {request_id}");
    Ok(record)
}

/// Confirm or reject a donation in its own transaction.
///
/// `actor` is the orphanage acting; `None` means the payment success
/// handler, which needs no ownership check.
pub async fn resolve_donation(
    pool: &SqlitePool,
    donation_id: i64,
    actor: Option<i64>,
    decision: Decision,
) -> Result<Resolution> {
    let mut tx = pool.begin().await?;
    let resolution = resolve_donation_in(&mut tx, donation_id, actor, decision).await?;
    tx.commit().await?;
    Ok(resolution)
}

/// Body of [`resolve_donation`], for callers that already hold a transaction.
///
/// The guarded `UPDATE … WHERE confirmation = 'pending'` runs first: it
/// takes the write lock and makes a second resolution of the same donation
/// a no-op that we report as a conflict.  The request total is then
/// recomputed from all confirmed donations rather than incremented.
pub(crate) async fn resolve_donation_in(
    conn: &mut SqliteConnection,
    donation_id: i64,
    actor: Option<i64>,
    decision: Decision,
) -> Result<Resolution> {
    let resolved_at = now();
    let claimed = sqlx::query(
        r#"
        UPDATE donations
        SET    confirmation = ?1, resolved_at = ?2
        WHERE  id = ?3 AND confirmation = 'pending'
        "#,
    )
    .bind(decision.confirmation().as_str())
    .bind(resolved_at)
    .bind(donation_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let record = fetch_donation(conn, donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("donation {donation_id}")))?;

    if claimed == 0 {
        // Someone resolved it first; let the ledger name the state.
        let mut current = record.to_donation()?;
        match decision {
            Decision::Confirm => ledger::confirm(&mut current)?,
            Decision::Reject => ledger::reject(&mut current)?,
        }
        return Err(AppError::Conflict(format!("donation {donation_id} changed concurrently")));
    }

    let request_record = fetch_request(conn, record.request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("request {}", record.request_id)))?;
    let request = request_record.to_request()?;

    if let Some(orphanage_id) = actor {
        if request.orphanage_id != orphanage_id {
            return Err(AppError::Forbidden(format!(
                "request {} belongs to another orphanage",
                request.id
            )));
        }
    }

    let donations = fetch_donations(conn, request.id)
        .await?
        .iter()
        .map(DonationRecord::to_donation)
        .collect::<Result<Vec<_>>>()?;
    let settlement = ledger::settle(&request, &donations);

    sqlx::query(
        r#"
        UPDATE requests
        SET    donated = ?1,
               status = ?2,
               fulfilled_at = CASE WHEN ?3 THEN ?4 ELSE fulfilled_at END
        WHERE  id = ?5
        "#,
    )
    .bind(settlement.donated)
    .bind(settlement.status.as_str())
    .bind(settlement.newly_fulfilled)
    .bind(resolved_at)
    .bind(request.id)
    .execute(&mut *conn)
    .await?;

    let (kind, verb) = match decision {
        Decision::Confirm => (NotificationKind::DonationConfirmed, "confirmed"),
        Decision::Reject => (NotificationKind::DonationRejected, "declined"),
    };
    notify(
        conn,
        &NewNotification::new(
            record.donor_id,
            kind,
            donation_id,
            format!("Your donation to \"{}\" was {verb}", request.title),
        ),
    )
    .await?;

    if settlement.newly_fulfilled {
        notify(
            conn,
            &NewNotification::new(
                request.orphanage_id,
                NotificationKind::RequestFulfilled,
                request.id,
                format!("\"{}\" is fully funded", request.title),
            ),
        )
        .await?;
        info!("Request {} fulfilled at {}", request.id, settlement.donated);
    }

    info!(
        "Donation {donation_id} {} for request {} now at {}",
        decision.confirmation(),
        request.id,
        settlement.donated
    );

    let after = fetch_request(conn, request.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("request {}", request.id)))?;
    let after_donations = fetch_donations(conn, request.id).await?;

    Ok(Resolution {
        donation: record.to_view()?,
        request: view(&after, &after_donations)?,
        newly_fulfilled: settlement.newly_fulfilled,
    })
}
