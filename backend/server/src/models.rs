//! Database records and the request/response shapes built from them.

use std::fmt;
use std::str::FromStr;

use donation_ledger::{
    Confirmation, Contribution, Donation, Fundraiser, FundraiserDonation, FundraiserProgress,
    Progress, Request, RequestKind, RequestStatus, Service, SubtypeQuantity, SubtypeTarget,
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::notifications::NotificationKind;

// ─────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Donor,
    Orphanage,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Orphanage => "orphanage",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "donor" => Ok(Self::Donor),
            "orphanage" => Ok(Self::Orphanage),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::BadRequest(format!("unknown role `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: i64,
}

impl UserRecord {
    pub fn role(&self) -> Result<UserRole> {
        self.role.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

// ─────────────────────────────────────────────────────────
// Requests & donations
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestRecord {
    pub id: i64,
    pub orphanage_id: i64,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub city: String,
    pub target: Option<i64>,
    pub subtypes: String,
    pub status: String,
    pub donated: i64,
    pub created_at: i64,
    pub fulfilled_at: Option<i64>,
}

impl RequestRecord {
    pub fn to_request(&self) -> Result<Request> {
        let subtypes: Vec<SubtypeTarget> = serde_json::from_str(&self.subtypes)?;
        Ok(Request {
            id: self.id,
            orphanage_id: self.orphanage_id,
            kind: self.kind.parse()?,
            title: self.title.clone(),
            description: self.description.clone(),
            city: self.city.clone(),
            target: self.target,
            subtypes,
            status: self.status.parse()?,
            donated: self.donated,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub orphanage_id: i64,
    pub kind: RequestKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to the orphanage's own city.
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub target: Option<i64>,
    #[serde(default)]
    pub subtypes: Vec<SubtypeTarget>,
}

/// Query string for the request browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub city: Option<String>,
    pub kind: Option<RequestKind>,
    pub status: Option<RequestStatus>,
    pub orphanage_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: Request,
    pub created_at: i64,
    pub fulfilled_at: Option<i64>,
    pub progress: Progress,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationRecord {
    pub id: i64,
    pub donor_id: i64,
    pub request_id: i64,
    pub kind: String,
    pub quantity: i64,
    pub items: Option<String>,
    pub confirmation: String,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

impl DonationRecord {
    pub fn to_donation(&self) -> Result<Donation> {
        let contribution = match &self.items {
            Some(json) => Contribution::Items(serde_json::from_str::<Vec<SubtypeQuantity>>(json)?),
            None => Contribution::Units(self.quantity),
        };
        Ok(Donation {
            id: self.id,
            donor_id: self.donor_id,
            request_id: self.request_id,
            contribution,
            confirmation: self.confirmation.parse()?,
        })
    }

    pub fn to_view(&self) -> Result<DonationView> {
        Ok(DonationView {
            donation: self.to_donation()?,
            kind: self.kind.parse()?,
            quantity: self.quantity,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationView {
    #[serde(flatten)]
    pub donation: Donation,
    pub kind: RequestKind,
    /// Total units across items.
    pub quantity: i64,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

/// Response to a confirmation or rejection.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub donation: DonationView,
    pub request: RequestView,
    pub newly_fulfilled: bool,
}

// ─────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    AwaitingOtp,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingOtp => "awaiting_otp",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "awaiting_otp" => Ok(Self::AwaitingOtp),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::Payment(format!("unknown payment status `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: i64,
    pub donation_id: i64,
    pub bank: String,
    pub reference: String,
    pub status: String,
    pub attempts: i64,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl PaymentRecord {
    pub fn status(&self) -> Result<PaymentStatus> {
        self.status.parse()
    }
}

// ─────────────────────────────────────────────────────────
// Fundraisers
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FundraiserRecord {
    pub id: i64,
    pub orphanage_id: i64,
    pub title: String,
    pub description: String,
    pub target: i64,
    pub raised: i64,
    pub status: String,
    pub created_at: i64,
}

impl FundraiserRecord {
    pub fn to_fundraiser(&self) -> Result<Fundraiser> {
        Ok(Fundraiser {
            id: self.id,
            orphanage_id: self.orphanage_id,
            title: self.title.clone(),
            description: self.description.clone(),
            target: self.target,
            raised: self.raised,
            status: self.status.parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FundraiserDonationRecord {
    pub id: i64,
    pub fundraiser_id: i64,
    pub donor_id: i64,
    pub amount: i64,
    pub confirmation: String,
    pub created_at: i64,
}

impl FundraiserDonationRecord {
    pub fn to_donation(&self) -> Result<FundraiserDonation> {
        Ok(FundraiserDonation {
            id: self.id,
            fundraiser_id: self.fundraiser_id,
            donor_id: self.donor_id,
            amount: self.amount,
            confirmation: self.confirmation.parse::<Confirmation>()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFundraiser {
    pub orphanage_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target: donation_ledger::Quantity,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundraiserView {
    #[serde(flatten)]
    pub fundraiser: Fundraiser,
    pub created_at: i64,
    pub progress: FundraiserProgress,
}

// ─────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRecord {
    pub id: i64,
    pub orphanage_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub donor_id: Option<i64>,
    pub offer_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ServiceRecord {
    pub fn to_service(&self) -> Result<Service> {
        Ok(Service {
            id: self.id,
            orphanage_id: self.orphanage_id,
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status.parse()?,
        })
    }

    pub fn to_view(&self) -> Result<ServiceView> {
        Ok(ServiceView {
            service: self.to_service()?,
            donor_id: self.donor_id,
            offer_note: self.offer_note.clone(),
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: Service,
    pub donor_id: Option<i64>,
    pub offer_note: Option<String>,
    pub updated_at: i64,
}

// ─────────────────────────────────────────────────────────
// Notifications & messages
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub subject_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
}

impl NotificationRecord {
    pub fn kind(&self) -> NotificationKind {
        NotificationKind::from_db(&self.kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
}
