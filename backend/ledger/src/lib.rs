//! # Donation Ledger
//!
//! Fulfillment accounting for the orphanage donation platform.  Every total
//! and every status flip the server performs is decided here, so the rules
//! live in exactly one place:
//!
//! | Concern              | Entry Point(s)                                      |
//! |----------------------|-----------------------------------------------------|
//! | Pledge parsing       | [`Quantity`], [`PledgeForm::contribution`], [`check_quantity`] |
//! | Request accounting   | [`validate_request`], [`tally`], [`progress`], [`validate_pledge`], [`settle`] |
//! | Confirmation         | [`confirm`], [`reject`], [`confirm_fundraiser_donation`], [`reject_fundraiser_donation`] |
//! | Fundraisers          | [`fundraiser_progress`], [`settle_fundraiser`]      |
//! | Services             | [`ServiceStatus::apply`]                            |
//!
//! The crate performs no I/O.  Callers load the request and its donations,
//! ask the ledger for the outcome, and persist it inside their own
//! transaction.

mod fulfillment;
mod quantity;
mod service;
mod types;

#[cfg(test)]
mod test_fulfillment;

use thiserror::Error;

pub use fulfillment::{
    confirm, confirm_fundraiser_donation, fundraiser_progress, progress, reject,
    reject_fundraiser_donation, settle, settle_fundraiser, tally, validate_fundraiser_pledge,
    validate_pledge, validate_request, FundraiserProgress, Progress, Settlement,
    SubtypeProgress, Tally,
};
pub use quantity::{check_quantity, ItemPledge, PledgeForm, Quantity, MAX_QUANTITY};
pub use service::ServiceAction;
pub use types::{
    Confirmation, Contribution, Donation, Fundraiser, FundraiserDonation, FundraiserStatus,
    Request, RequestKind, RequestStatus, Service, ServiceStatus, SubtypeQuantity, SubtypeTarget,
};

/// Everything the ledger can refuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("quantity {value} exceeds the limit of {max}")]
    QuantityTooLarge { value: i64, max: i64 },

    #[error("unknown {field} value: {value}")]
    UnknownVariant { field: &'static str, value: String },

    #[error("request {0} is already fulfilled")]
    RequestClosed(i64),

    #[error("fundraiser {0} is already completed")]
    FundraiserClosed(i64),

    #[error("no `{field}` given for a {kind} request")]
    MissingQuantity { field: &'static str, kind: &'static str },

    #[error("request {0} is split into subtypes; pledge per item")]
    ItemsRequired(i64),

    #[error("request {0} has no subtypes")]
    UnexpectedItems(i64),

    #[error("request has no subtype named `{0}`")]
    UnknownSubtype(String),

    #[error("pledge of {pledged} exceeds remaining need of {remaining}")]
    ExceedsRemaining { pledged: i64, remaining: i64 },

    #[error("pledge of {pledged} `{item}` exceeds remaining need of {remaining}")]
    ItemExceedsRemaining {
        item: String,
        pledged: i64,
        remaining: i64,
    },

    #[error("donation {0} was already {1}")]
    AlreadyResolved(i64, &'static str),

    #[error("service cannot go from {from} via {action}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
