//! Rows for the simulated bank payment flow.

use sqlx::{SqliteConnection, SqlitePool};

use super::now;
use crate::errors::{AppError, Result};
use crate::models::{PaymentRecord, PaymentStatus};

const PAYMENT_COLUMNS: &str =
    "id, donation_id, bank, reference, status, attempts, created_at, completed_at";

/// Open a payment for a donation, or reuse the one already awaiting OTP.
pub async fn open_payment(pool: &SqlitePool, donation_id: i64, bank: &str) -> Result<PaymentRecord> {
    let ts = now();
    let reference = format!("PAY-{donation_id:06}-{ts}");
    sqlx::query(
        r#"
        INSERT INTO payments (donation_id, bank, reference, status, attempts, created_at)
        VALUES (?1, ?2, ?3, 'awaiting_otp', 0, ?4)
        ON CONFLICT (donation_id) DO UPDATE
            SET bank = excluded.bank
            WHERE payments.status = 'awaiting_otp'
        "#,
    )
    .bind(donation_id)
    .bind(bank)
    .bind(&reference)
    .bind(ts)
    .execute(pool)
    .await?;

    let payment = payment_for(pool, donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment for donation {donation_id}")))?;
    if payment.status()? != PaymentStatus::AwaitingOtp {
        return Err(AppError::Conflict(format!(
            "payment for donation {donation_id} already {}",
            payment.status
        )));
    }
    Ok(payment)
}

pub async fn payment_for(pool: &SqlitePool, donation_id: i64) -> Result<Option<PaymentRecord>> {
    let row = sqlx::query_as::<_, PaymentRecord>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE donation_id = ?1"
    ))
    .bind(donation_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Count a wrong OTP; the payment fails once `max_attempts` is reached.
/// Returns the updated record.
pub async fn record_failed_attempt(
    pool: &SqlitePool,
    payment_id: i64,
    max_attempts: i64,
) -> Result<PaymentRecord> {
    let row = sqlx::query_as::<_, PaymentRecord>(&format!(
        r#"
        UPDATE payments
        SET    attempts = attempts + 1,
               status = CASE WHEN attempts + 1 >= ?1 THEN 'failed' ELSE status END,
               completed_at = CASE WHEN attempts + 1 >= ?1 THEN ?2 ELSE completed_at END
        WHERE  id = ?3 AND status = 'awaiting_otp'
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(max_attempts)
    .bind(now())
    .bind(payment_id)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| AppError::Conflict(format!("payment {payment_id} is no longer open")))
}

/// Close an open payment as succeeded on the caller's transaction.
pub async fn mark_succeeded(conn: &mut SqliteConnection, payment_id: i64) -> Result<()> {
    let affected = sqlx::query(
        r#"
        UPDATE payments
        SET    status = 'succeeded', completed_at = ?1
        WHERE  id = ?2 AND status = 'awaiting_otp'
        "#,
    )
    .bind(now())
    .bind(payment_id)
    .execute(conn)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::Conflict(format!("payment {payment_id} is no longer open")));
    }
    Ok(())
}
