//! Notification kinds written alongside the state changes that cause them.

use serde::{Deserialize, Serialize};

/// All notification kinds the platform emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A donor pledged against one of the orphanage's requests.
    DonationReceived,
    /// The orphanage accepted the donor's donation.
    DonationConfirmed,
    /// The orphanage turned the donor's donation down.
    DonationRejected,
    /// Confirmed donations met a request's target.
    RequestFulfilled,
    /// A fundraiser reached its target.
    FundraiserCompleted,
    /// A donor offered to provide a service.
    ServiceOffered,
    /// A service moved to a new status.
    ServiceUpdated,
    /// A chat message arrived.
    MessageReceived,
    /// A kind stored by a newer version that we don't recognise.
    Unknown,
}

impl NotificationKind {
    /// Short identifier stored in the `notifications.kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DonationReceived => "donation_received",
            Self::DonationConfirmed => "donation_confirmed",
            Self::DonationRejected => "donation_rejected",
            Self::RequestFulfilled => "request_fulfilled",
            Self::FundraiserCompleted => "fundraiser_completed",
            Self::ServiceOffered => "service_offered",
            Self::ServiceUpdated => "service_updated",
            Self::MessageReceived => "message_received",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of [`as_str`](Self::as_str); unrecognised strings map to `Unknown`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "donation_received" => Self::DonationReceived,
            "donation_confirmed" => Self::DonationConfirmed,
            "donation_rejected" => Self::DonationRejected,
            "request_fulfilled" => Self::RequestFulfilled,
            "fundraiser_completed" => Self::FundraiserCompleted,
            "service_offered" => Self::ServiceOffered,
            "service_updated" => Self::ServiceUpdated,
            "message_received" => Self::MessageReceived,
            _ => Self::Unknown,
        }
    }
}

/// A notification waiting to be written.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub subject_id: Option<i64>,
    pub message: String,
}

impl NewNotification {
    pub fn new(user_id: i64, kind: NotificationKind, subject_id: i64, message: String) -> Self {
        Self {
            user_id,
            kind,
            subject_id: Some(subject_id),
            message,
        }
    }
}
