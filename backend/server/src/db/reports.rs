//! Aggregates for the admin console.

use std::collections::BTreeMap;

use donation_ledger::RequestKind;
use serde::Serialize;
use sqlx::SqlitePool;

use super::fundraisers::confirmed_gift_count;
use crate::errors::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct FundraiserTotals {
    pub count: i64,
    pub completed: i64,
    pub target: i64,
    pub raised: i64,
    pub confirmed_gifts: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminReport {
    pub users_by_role: BTreeMap<String, i64>,
    pub requests_by_status: BTreeMap<String, i64>,
    pub donations_by_confirmation: BTreeMap<String, i64>,
    /// Confirmed units per request kind; every kind is present.
    pub confirmed_units_by_kind: BTreeMap<RequestKind, i64>,
    pub fundraisers: FundraiserTotals,
    pub services_by_status: BTreeMap<String, i64>,
    pub generated_at: i64,
}

async fn grouped(pool: &SqlitePool, sql: &str) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

pub async fn admin_report(pool: &SqlitePool) -> Result<AdminReport> {
    let users_by_role = grouped(pool, "SELECT role, COUNT(*) FROM users GROUP BY role").await?;
    let requests_by_status =
        grouped(pool, "SELECT status, COUNT(*) FROM requests GROUP BY status").await?;
    let donations_by_confirmation = grouped(
        pool,
        "SELECT confirmation, COUNT(*) FROM donations GROUP BY confirmation",
    )
    .await?;
    let services_by_status =
        grouped(pool, "SELECT status, COUNT(*) FROM services GROUP BY status").await?;

    let units = grouped(
        pool,
        "SELECT kind, COALESCE(SUM(quantity), 0) FROM donations WHERE confirmation = 'confirmed' GROUP BY kind",
    )
    .await?;
    let confirmed_units_by_kind: BTreeMap<RequestKind, i64> = RequestKind::ALL
        .iter()
        .map(|k| (*k, units.get(k.as_str()).copied().unwrap_or(0)))
        .collect();

    let (count, completed, target, raised): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(target), 0),
               COALESCE(SUM(raised), 0)
        FROM   fundraisers
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(AdminReport {
        users_by_role,
        requests_by_status,
        donations_by_confirmation,
        confirmed_units_by_kind,
        fundraisers: FundraiserTotals {
            count,
            completed,
            target,
            raised,
            confirmed_gifts: confirmed_gift_count(pool).await?,
        },
        services_by_status,
        generated_at: super::now(),
    })
}
