//! Pledge parsing.
//!
//! Donation forms submit quantities either as JSON numbers or as the raw
//! text the donor typed.  [`Quantity`] accepts both and normalises to whole
//! units; [`PledgeForm`] then picks the field that matches the request kind.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Contribution, Request, RequestKind, SubtypeQuantity};
use crate::{Error, Result};

/// Ceiling for any single target or pledged figure.
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Refuse figures that are not positive or exceed [`MAX_QUANTITY`].
pub fn check_quantity(n: i64) -> Result<i64> {
    if n <= 0 {
        return Err(Error::InvalidQuantity(n.to_string()));
    }
    if n > MAX_QUANTITY {
        return Err(Error::QuantityTooLarge {
            value: n,
            max: MAX_QUANTITY,
        });
    }
    Ok(n)
}

/// A whole-unit quantity coerced from a number or numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Quantity(pub i64);

impl Quantity {
    /// Parse donor-typed text such as `" 40 "` or `"12.0"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Ok(Self(n));
        }
        match trimmed.parse::<f64>() {
            Ok(f) => Self::from_f64(f),
            Err(_) => Err(Error::InvalidQuantity(raw.to_string())),
        }
    }

    fn from_f64(f: f64) -> Result<Self> {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            Ok(Self(f as i64))
        } else {
            Err(Error::InvalidQuantity(f.to_string()))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Quantity(n)),
            Raw::Float(f) => Quantity::from_f64(f),
            Raw::Text(s) => Quantity::parse(&s),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

/// One item line in a subtyped pledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPledge {
    pub name: String,
    pub quantity: Quantity,
}

/// The donation form as submitted.  Only the field matching the request's
/// kind is read; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeForm {
    #[serde(default)]
    pub amount: Option<Quantity>,
    #[serde(default)]
    pub clothes: Option<Quantity>,
    #[serde(default)]
    pub meals: Option<Quantity>,
    #[serde(default)]
    pub quantity: Option<Quantity>,
    #[serde(default)]
    pub items: Vec<ItemPledge>,
}

impl PledgeForm {
    /// Resolve the form into a [`Contribution`] for `request`.
    ///
    /// Subtyped requests take `items`; all others take the kind's own field.
    /// Item lines with a zero quantity are dropped, so a form that lists every
    /// subtype but fills in only some still resolves.
    pub fn contribution(&self, request: &Request) -> Result<Contribution> {
        if request.is_subtyped() {
            if self.items.is_empty() {
                return Err(Error::ItemsRequired(request.id));
            }
            let items = self
                .items
                .iter()
                .filter(|i| i.quantity.get() != 0)
                .map(|i| SubtypeQuantity {
                    name: i.name.trim().to_string(),
                    quantity: i.quantity.get(),
                })
                .collect::<Vec<_>>();
            if items.is_empty() {
                return Err(Error::InvalidQuantity("0".to_string()));
            }
            return Ok(Contribution::Items(items));
        }

        if !self.items.is_empty() {
            return Err(Error::UnexpectedItems(request.id));
        }

        let field = match request.kind {
            RequestKind::Money => self.amount,
            RequestKind::Clothes => self.clothes,
            RequestKind::Food => self.meals,
            RequestKind::Other => self.quantity,
        };
        field
            .map(|q| Contribution::Units(q.get()))
            .ok_or(Error::MissingQuantity {
                field: request.kind.pledge_field(),
                kind: request.kind.as_str(),
            })
    }
}
