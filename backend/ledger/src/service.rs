//! Service lifecycle.
//!
//! A service is settled by a single fulfilling record: the donor's offer.
//! The orphanage accepts it, then marks the work complete or rejects it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ServiceStatus;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAction {
    Accept,
    Complete,
    Reject,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Complete => "complete",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ServiceStatus {
    /// Next status after `action`, or an error for any backward or
    /// out-of-terminal move.
    pub fn apply(self, action: ServiceAction) -> Result<ServiceStatus> {
        use ServiceAction::*;
        use ServiceStatus::*;

        match (self, action) {
            (Pending, Accept) => Ok(InProgress),
            (InProgress, Complete) => Ok(Fulfilled),
            (Pending | InProgress, Reject) => Ok(Rejected),
            (from, action) => Err(Error::InvalidTransition {
                from: from.as_str(),
                action: action.as_str(),
            }),
        }
    }
}
