//! Simulated bank payment for money donations.
//!
//! The donor picks a bank, receives a payment reference, and enters the
//! one-time password the "bank" sent.  A correct OTP closes the payment and
//! confirms the donation in the same transaction; too many wrong entries
//! fail the payment and leave the donation pending.

use donation_ledger::{Confirmation, RequestKind};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{self, requests::Decision};
use crate::errors::{AppError, Result};
use crate::models::{PaymentRecord, PaymentStatus, Resolution};

#[derive(Debug, Clone, Deserialize)]
pub struct StartPayment {
    pub donor_id: i64,
    pub bank: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPayment {
    pub donor_id: i64,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub reference: String,
    pub bank: String,
    pub status: PaymentStatus,
    pub attempts_left: i64,
}

impl PaymentView {
    fn from_record(record: &PaymentRecord, max_attempts: i64) -> Result<Self> {
        Ok(Self {
            reference: record.reference.clone(),
            bank: record.bank.clone(),
            status: record.status()?,
            attempts_left: (max_attempts - record.attempts).max(0),
        })
    }
}

/// Check the donation can be paid by this donor.
async fn payable(pool: &SqlitePool, donation_id: i64, donor_id: i64) -> Result<()> {
    let donation = db::requests::get_donation(pool, donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("donation {donation_id}")))?;
    if donation.donor_id != donor_id {
        return Err(AppError::Forbidden(format!(
            "donation {donation_id} belongs to another donor"
        )));
    }
    if donation.kind.parse::<RequestKind>()? != RequestKind::Money {
        return Err(AppError::BadRequest(format!(
            "donation {donation_id} is a {} donation; only money is paid online",
            donation.kind
        )));
    }
    if donation.confirmation.parse::<Confirmation>()? != Confirmation::Pending {
        return Err(AppError::Conflict(format!(
            "donation {donation_id} is already {}",
            donation.confirmation
        )));
    }
    Ok(())
}

pub async fn start(
    pool: &SqlitePool,
    config: &Config,
    donation_id: i64,
    req: &StartPayment,
) -> Result<PaymentView> {
    let bank = req.bank.trim();
    if bank.is_empty() {
        return Err(AppError::BadRequest("choose a bank".to_string()));
    }
    payable(pool, donation_id, req.donor_id).await?;

    let record = db::payments::open_payment(pool, donation_id, bank).await?;
    info!("Payment {} opened for donation {donation_id} via {bank}", record.reference);
    PaymentView::from_record(&record, config.payment_max_attempts)
}

/// Outcome of an OTP entry.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub payment: PaymentView,
    pub resolution: Resolution,
}

pub async fn verify(
    pool: &SqlitePool,
    config: &Config,
    donation_id: i64,
    req: &VerifyPayment,
) -> Result<VerifyOutcome> {
    payable(pool, donation_id, req.donor_id).await?;
    let record = db::payments::payment_for(pool, donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment for donation {donation_id}")))?;
    if record.status()? != PaymentStatus::AwaitingOtp {
        return Err(AppError::Conflict(format!(
            "payment {} is already {}",
            record.reference, record.status
        )));
    }

    if req.otp.trim() != config.payment_otp {
        let updated =
            db::payments::record_failed_attempt(pool, record.id, config.payment_max_attempts)
                .await?;
        let view = PaymentView::from_record(&updated, config.payment_max_attempts)?;
        warn!(
            "Wrong OTP for payment {} ({} attempts left)",
            updated.reference, view.attempts_left
        );
        return Err(match view.status {
            PaymentStatus::Failed => AppError::Payment(format!(
                "payment {} failed after too many wrong codes",
                updated.reference
            )),
            _ => AppError::Payment(format!(
                "wrong code; {} attempt(s) left",
                view.attempts_left
            )),
        });
    }

    let mut tx = pool.begin().await?;
    db::payments::mark_succeeded(&mut tx, record.id).await?;
    let resolution =
        db::requests::resolve_donation_in(&mut tx, donation_id, None, Decision::Confirm).await?;
    tx.commit().await?;

    info!("Payment {} succeeded; donation {donation_id} confirmed", record.reference);
    let closed = db::payments::payment_for(pool, donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment for donation {donation_id}")))?;
    Ok(VerifyOutcome {
        payment: PaymentView::from_record(&closed, config.payment_max_attempts)?,
        resolution,
    })
}
