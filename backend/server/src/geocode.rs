//! Reverse-geocoding client: coordinates to a city name.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the provider rate-limits us or the
//!   connection fails, up to [`MAX_BACKOFF_SECS`] seconds per wait.
//! * After [`MAX_ATTEMPTS`] tries the last error is returned.
//! * Any other non-success status is a hard failure.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{AppError, Result};

const MAX_BACKOFF_SECS: u64 = 8;
const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_ATTEMPTS: u32 = 4;

// ─────────────────────────────────────────────────────────
// Provider response shape
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub principal_subdivision: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
}

/// What we hand back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Place {
    pub city: String,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl ReverseGeocodeResponse {
    /// Prefer `city`, fall back to `locality`; blank strings count as missing.
    pub fn into_place(self) -> Option<Place> {
        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let city = non_blank(self.city).or_else(|| non_blank(self.locality))?;
        Some(Place {
            city: city.trim().to_string(),
            region: non_blank(self.principal_subdivision),
            country: non_blank(self.country_name),
        })
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Geocoder {
    client: Client,
    url: String,
}

impl Geocoder {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Resolve `(latitude, longitude)` to a place.
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Place> {
        validate_coordinates(latitude, longitude)?;

        let mut backoff = INITIAL_BACKOFF_SECS;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self
                .client
                .get(&self.url)
                .query(&[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("localityLanguage", "en".to_string()),
                ])
                .send()
                .await;

            let retry_reason = match response {
                Err(e) if attempt < MAX_ATTEMPTS && (e.is_connect() || e.is_timeout()) => {
                    format!("request failed: {e}")
                }
                Err(e) => return Err(AppError::Http(e)),
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(AppError::Geocode("rate-limited by provider".to_string()));
                    }
                    "rate-limited".to_string()
                }
                Ok(resp) if !resp.status().is_success() => {
                    return Err(AppError::Geocode(format!(
                        "provider returned {}",
                        resp.status()
                    )));
                }
                Ok(resp) => {
                    let body: ReverseGeocodeResponse = resp.json().await?;
                    debug!("Reverse geocoded ({latitude}, {longitude}) → {body:?}");
                    return body.into_place().ok_or_else(|| {
                        AppError::Geocode(format!("no city found at ({latitude}, {longitude})"))
                    });
                }
            };

            warn!("Geocoding {retry_reason} (will retry in {backoff}s)");
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
        }
    }
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::BadRequest(format!(
            "coordinates out of range: ({latitude}, {longitude})"
        )));
    }
    Ok(())
}
