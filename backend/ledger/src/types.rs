//! # Types
//!
//! Shared data structures for requests, donations, fundraisers and services.
//!
//! ## Status lifecycles
//!
//! ```text
//! Request:      Pending ──► Fulfilled
//! Donation:     Pending ──► Confirmed
//!                  └──────► Rejected
//! Fundraiser:   Active  ──► Completed
//! Service:      Pending ──► InProgress ──► Fulfilled
//!                  └───────────┴─────────► Rejected
//! ```
//!
//! Every transition is forward-only.  Request and fundraiser statuses are
//! derived from confirmed totals by [`crate::settle`] and
//! [`crate::settle_fundraiser`]; service transitions go through
//! [`ServiceStatus::apply`](crate::ServiceStatus::apply).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Implements `as_str`, `Display` and `FromStr` over the lowercase storage
/// encoding of a status-like enum.
macro_rules! string_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(Error::UnknownVariant {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// What an orphanage is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Money,
    Clothes,
    Food,
    Other,
}

string_enum!(RequestKind, "kind", {
    Money => "money",
    Clothes => "clothes",
    Food => "food",
    Other => "other",
});

impl RequestKind {
    /// Name of the pledge field that carries this kind's quantity.
    pub fn pledge_field(&self) -> &'static str {
        match self {
            Self::Money => "amount",
            Self::Clothes => "clothes",
            Self::Food => "meals",
            Self::Other => "quantity",
        }
    }

    pub const ALL: [RequestKind; 4] = [Self::Money, Self::Clothes, Self::Food, Self::Other];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Still collecting donations.
    Pending,
    /// Confirmed donations met the target.
    Fulfilled,
}

string_enum!(RequestStatus, "status", {
    Pending => "pending",
    Fulfilled => "fulfilled",
});

/// Whether the receiving orphanage has accepted a donation as genuine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Pending,
    Confirmed,
    Rejected,
}

string_enum!(Confirmation, "confirmation", {
    Pending => "pending",
    Confirmed => "confirmed",
    Rejected => "rejected",
});

/// One line of a request split into items, e.g. "shoes, 10 pairs".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeTarget {
    pub name: String,
    pub target: i64,
}

/// An orphanage's posted need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub orphanage_id: i64,
    pub kind: RequestKind,
    pub title: String,
    pub description: String,
    pub city: String,
    /// Overall target for requests without subtypes.  `None` means the
    /// request can never be fulfilled by donations alone.
    pub target: Option<i64>,
    #[serde(default)]
    pub subtypes: Vec<SubtypeTarget>,
    pub status: RequestStatus,
    /// Running confirmed total as last persisted.
    pub donated: i64,
}

impl Request {
    pub fn is_subtyped(&self) -> bool {
        !self.subtypes.is_empty()
    }

    pub fn subtype(&self, name: &str) -> Option<&SubtypeTarget> {
        self.subtypes.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeQuantity {
    pub name: String,
    pub quantity: i64,
}

/// What a donation brings to its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Contribution {
    /// Money amount, clothes count, meal count or generic units.
    Units(i64),
    /// Per-subtype quantities for a subtyped request.
    Items(Vec<SubtypeQuantity>),
}

impl Contribution {
    /// Total units across all items.
    pub fn total(&self) -> i64 {
        match self {
            Self::Units(n) => *n,
            Self::Items(items) => items
                .iter()
                .fold(0i64, |acc, i| acc.saturating_add(i.quantity)),
        }
    }
}

/// A donor's pledge against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: i64,
    pub donor_id: i64,
    pub request_id: i64,
    pub contribution: Contribution,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundraiserStatus {
    Active,
    Completed,
}

string_enum!(FundraiserStatus, "fundraiser status", {
    Active => "active",
    Completed => "completed",
});

/// A money-raising campaign with its own donation records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fundraiser {
    pub id: i64,
    pub orphanage_id: i64,
    pub title: String,
    pub description: String,
    pub target: i64,
    pub raised: i64,
    pub status: FundraiserStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundraiserDonation {
    pub id: i64,
    pub fundraiser_id: i64,
    pub donor_id: i64,
    pub amount: i64,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Posted; waiting for a donor to offer.
    Pending,
    /// An offer was accepted and the work is under way.
    InProgress,
    Fulfilled,
    Rejected,
}

string_enum!(ServiceStatus, "service status", {
    Pending => "pending",
    InProgress => "in_progress",
    Fulfilled => "fulfilled",
    Rejected => "rejected",
});

/// A non-monetary need such as a workshop or tutoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub orphanage_id: i64,
    pub title: String,
    pub description: String,
    pub status: ServiceStatus,
}
