//! Fulfillment accounting.
//!
//! Only `Confirmed` donations ever count.  Totals are recomputed from the
//! full donation set rather than incremented, so running any of these
//! functions twice over the same data gives the same answer.
//!
//! Inputs are capped at [`crate::MAX_QUANTITY`] before they are stored; sums over
//! stored rows saturate rather than wrap.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{
    Confirmation, Contribution, Donation, Fundraiser, FundraiserDonation, FundraiserStatus,
    Request, RequestStatus,
};
use crate::quantity::check_quantity;
use crate::{Error, Result};

/// Raw confirmed sums for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tally {
    pub donated: i64,
    /// Declared subtypes only, each starting at zero.
    pub per_subtype: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtypeProgress {
    pub name: String,
    pub target: i64,
    pub donated: i64,
    pub remaining: i64,
    pub exhausted: bool,
}

/// What a request browser shows next to each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub donated: i64,
    pub target: Option<i64>,
    /// `None` when the request has no target and so no ceiling.
    pub remaining: Option<i64>,
    pub fulfilled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtypes: Vec<SubtypeProgress>,
}

/// Outcome to persist after a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub donated: i64,
    pub status: RequestStatus,
    /// True only on the Pending → Fulfilled edge.
    pub newly_fulfilled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FundraiserProgress {
    pub raised: i64,
    pub target: i64,
    pub remaining: i64,
    pub completed: bool,
    #[serde(skip)]
    pub status: FundraiserStatus,
    #[serde(skip)]
    pub newly_completed: bool,
}

// ─────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────

/// Check a request before it is stored.
pub fn validate_request(request: &Request) -> Result<()> {
    if request.is_subtyped() {
        if request.target.is_some() {
            return Err(Error::InvalidRequest(
                "give either an overall target or subtypes, not both".to_string(),
            ));
        }
        let mut seen = BTreeMap::new();
        for s in &request.subtypes {
            if s.name.trim().is_empty() {
                return Err(Error::InvalidRequest("subtype name is empty".to_string()));
            }
            if s.target <= 0 {
                return Err(Error::InvalidRequest(format!(
                    "subtype `{}` needs a positive target",
                    s.name
                )));
            }
            check_quantity(s.target)?;
            if seen.insert(s.name.as_str(), ()).is_some() {
                return Err(Error::InvalidRequest(format!(
                    "subtype `{}` listed twice",
                    s.name
                )));
            }
        }
    } else if let Some(target) = request.target {
        if target <= 0 {
            return Err(Error::InvalidRequest("target must be positive".to_string()));
        }
        check_quantity(target)?;
    }
    Ok(())
}

/// Sum confirmed donations made against `request`.
///
/// Donations for other requests and unconfirmed donations are skipped.
/// Item quantities naming a subtype the request does not declare are ignored.
pub fn tally<'a, I>(request: &Request, donations: I) -> Tally
where
    I: IntoIterator<Item = &'a Donation>,
{
    let mut tally = Tally {
        donated: 0,
        per_subtype: request
            .subtypes
            .iter()
            .map(|s| (s.name.clone(), 0))
            .collect(),
    };

    let counted = donations
        .into_iter()
        .filter(|d| d.request_id == request.id && d.confirmation == Confirmation::Confirmed);

    for donation in counted {
        match (&donation.contribution, request.is_subtyped()) {
            (Contribution::Items(items), true) => {
                for item in items {
                    if let Some(sum) = tally.per_subtype.get_mut(&item.name) {
                        *sum = sum.saturating_add(item.quantity);
                    }
                }
            }
            (contribution, false) => {
                tally.donated = tally.donated.saturating_add(contribution.total())
            }
            (Contribution::Units(_), true) => {}
        }
    }

    if request.is_subtyped() {
        tally.donated = saturating_sum(tally.per_subtype.values().copied());
    }
    tally
}

/// Donated-so-far and fulfilled flag for `request`.
pub fn progress<'a, I>(request: &Request, donations: I) -> Progress
where
    I: IntoIterator<Item = &'a Donation>,
{
    let tally = tally(request, donations);

    if request.is_subtyped() {
        let subtypes: Vec<SubtypeProgress> = request
            .subtypes
            .iter()
            .map(|s| {
                let donated = tally.per_subtype.get(&s.name).copied().unwrap_or(0);
                SubtypeProgress {
                    name: s.name.clone(),
                    target: s.target,
                    donated,
                    remaining: s.target.saturating_sub(donated).max(0),
                    exhausted: donated >= s.target,
                }
            })
            .collect();
        return Progress {
            donated: tally.donated,
            target: Some(saturating_sum(subtypes.iter().map(|s| s.target))),
            remaining: Some(saturating_sum(subtypes.iter().map(|s| s.remaining))),
            fulfilled: subtypes.iter().all(|s| s.exhausted),
            subtypes,
        };
    }

    Progress {
        donated: tally.donated,
        target: request.target,
        remaining: request.target.map(|t| t.saturating_sub(tally.donated).max(0)),
        fulfilled: request.target.is_some_and(|t| tally.donated >= t),
        subtypes: Vec::new(),
    }
}

/// Refuse pledges the request cannot take.
///
/// `progress` must come from confirmed donations; pending pledges do not
/// reserve capacity.
pub fn validate_pledge(
    request: &Request,
    progress: &Progress,
    contribution: &Contribution,
) -> Result<()> {
    if request.status == RequestStatus::Fulfilled || progress.fulfilled {
        return Err(Error::RequestClosed(request.id));
    }

    match contribution {
        Contribution::Units(_) if request.is_subtyped() => Err(Error::ItemsRequired(request.id)),
        Contribution::Units(n) => {
            check_quantity(*n)?;
            match progress.remaining {
                Some(remaining) if *n > remaining => Err(Error::ExceedsRemaining {
                    pledged: *n,
                    remaining,
                }),
                _ => Ok(()),
            }
        }
        Contribution::Items(_) if !request.is_subtyped() => {
            Err(Error::UnexpectedItems(request.id))
        }
        Contribution::Items(items) => {
            let mut pledged: BTreeMap<&str, i64> = BTreeMap::new();
            for item in items {
                check_quantity(item.quantity)?;
                if request.subtype(&item.name).is_none() {
                    return Err(Error::UnknownSubtype(item.name.clone()));
                }
                let line = pledged.entry(item.name.as_str()).or_default();
                *line = check_quantity(line.saturating_add(item.quantity))?;
            }
            for sub in &progress.subtypes {
                let Some(&amount) = pledged.get(sub.name.as_str()) else {
                    continue;
                };
                if amount > sub.remaining {
                    return Err(Error::ItemExceedsRemaining {
                        item: sub.name.clone(),
                        pledged: amount,
                        remaining: sub.remaining,
                    });
                }
            }
            Ok(())
        }
    }
}

/// Recompute the request's running total and status from its donations.
///
/// A request that is already `Fulfilled` stays fulfilled.
pub fn settle<'a, I>(request: &Request, donations: I) -> Settlement
where
    I: IntoIterator<Item = &'a Donation>,
{
    let progress = progress(request, donations);
    let status = if request.status == RequestStatus::Fulfilled || progress.fulfilled {
        RequestStatus::Fulfilled
    } else {
        RequestStatus::Pending
    };
    Settlement {
        donated: progress.donated,
        status,
        newly_fulfilled: status == RequestStatus::Fulfilled
            && request.status == RequestStatus::Pending,
    }
}

fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

// ─────────────────────────────────────────────────────────
// Confirmation
// ─────────────────────────────────────────────────────────

fn resolve(id: i64, current: &mut Confirmation, to: Confirmation) -> Result<()> {
    match current {
        Confirmation::Pending => {
            *current = to;
            Ok(())
        }
        done => Err(Error::AlreadyResolved(id, done.as_str())),
    }
}

/// Accept a pending donation.  A donation is resolved at most once.
pub fn confirm(donation: &mut Donation) -> Result<()> {
    resolve(donation.id, &mut donation.confirmation, Confirmation::Confirmed)
}

pub fn reject(donation: &mut Donation) -> Result<()> {
    resolve(donation.id, &mut donation.confirmation, Confirmation::Rejected)
}

/// [`confirm`] for fundraiser donations.
pub fn confirm_fundraiser_donation(donation: &mut FundraiserDonation) -> Result<()> {
    resolve(donation.id, &mut donation.confirmation, Confirmation::Confirmed)
}

pub fn reject_fundraiser_donation(donation: &mut FundraiserDonation) -> Result<()> {
    resolve(donation.id, &mut donation.confirmation, Confirmation::Rejected)
}

// ─────────────────────────────────────────────────────────
// Fundraisers
// ─────────────────────────────────────────────────────────

/// Fundraisers take any positive amount while active; campaigns may
/// overshoot their target.
pub fn validate_fundraiser_pledge(fundraiser: &Fundraiser, amount: i64) -> Result<()> {
    if fundraiser.status == FundraiserStatus::Completed {
        return Err(Error::FundraiserClosed(fundraiser.id));
    }
    check_quantity(amount)?;
    Ok(())
}

/// Sum a fundraiser's own confirmed donations.
pub fn fundraiser_progress<'a, I>(fundraiser: &Fundraiser, donations: I) -> FundraiserProgress
where
    I: IntoIterator<Item = &'a FundraiserDonation>,
{
    let raised: i64 = donations
        .into_iter()
        .filter(|d| {
            d.fundraiser_id == fundraiser.id && d.confirmation == Confirmation::Confirmed
        })
        .fold(0i64, |acc, d| acc.saturating_add(d.amount));
    let completed = raised >= fundraiser.target;
    FundraiserProgress {
        raised,
        target: fundraiser.target,
        remaining: fundraiser.target.saturating_sub(raised).max(0),
        completed,
        status: fundraiser.status,
        newly_completed: false,
    }
}

/// Like [`settle`], for fundraisers.  `Completed` is sticky.
pub fn settle_fundraiser<'a, I>(fundraiser: &Fundraiser, donations: I) -> FundraiserProgress
where
    I: IntoIterator<Item = &'a FundraiserDonation>,
{
    let mut progress = fundraiser_progress(fundraiser, donations);
    let was_active = fundraiser.status == FundraiserStatus::Active;
    if progress.completed || !was_active {
        progress.status = FundraiserStatus::Completed;
        progress.completed = true;
    }
    progress.newly_completed = was_active && progress.status == FundraiserStatus::Completed;
    progress
}
