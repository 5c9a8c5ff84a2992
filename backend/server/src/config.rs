//! Application configuration loaded from environment variables.

use std::fmt::Display;
use std::ops::RangeInclusive;

use crate::errors::{AppError, Result};

/// Accepted range for `CLEANUP_INTERVAL_SECS` (one second to one week).
pub const CLEANUP_INTERVAL_RANGE: RangeInclusive<u64> = 1..=604_800;
/// Accepted range for `FULFILLED_RETENTION_DAYS` (zero to one hundred years).
pub const RETENTION_DAYS_RANGE: RangeInclusive<i64> = 0..=36_500;
/// Accepted range for `GEOCODE_TIMEOUT_SECS`.
pub const GEOCODE_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;
/// Accepted range for `PAYMENT_MAX_ATTEMPTS`.
pub const PAYMENT_ATTEMPTS_RANGE: RangeInclusive<i64> = 1..=100;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL; the file is created if missing
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Reverse-geocoding endpoint (BigDataCloud-compatible)
    pub geocode_url: String,
    /// Per-request timeout for the geocoding client
    pub geocode_timeout_secs: u64,
    /// How often (in seconds) the cleanup task looks for stale requests
    pub cleanup_interval_secs: u64,
    /// Fulfilled requests older than this many days are deleted
    pub fulfilled_retention_days: i64,
    /// One-time password the simulated bank accepts
    pub payment_otp: String,
    /// Wrong OTP entries allowed before a payment fails
    pub payment_max_attempts: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./orphan_aid.db".to_string()),
            api_port: parse_or("API_PORT", 3001)?,
            geocode_url: env_var("GEOCODE_URL").unwrap_or_else(|_| {
                "https://api.bigdatacloud.net/data/reverse-geocode-client".to_string()
            }),
            geocode_timeout_secs: parse_or("GEOCODE_TIMEOUT_SECS", 10)?,
            cleanup_interval_secs: parse_or("CLEANUP_INTERVAL_SECS", 3600)?,
            fulfilled_retention_days: parse_or("FULFILLED_RETENTION_DAYS", 30)?,
            payment_otp: env_var("PAYMENT_OTP").unwrap_or_else(|_| "123456".to_string()),
            payment_max_attempts: parse_or("PAYMENT_MAX_ATTEMPTS", 3)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or misdirect the background tasks.
    pub fn validate(&self) -> Result<()> {
        in_range("CLEANUP_INTERVAL_SECS", self.cleanup_interval_secs, &CLEANUP_INTERVAL_RANGE)?;
        in_range(
            "FULFILLED_RETENTION_DAYS",
            self.fulfilled_retention_days,
            &RETENTION_DAYS_RANGE,
        )?;
        in_range("GEOCODE_TIMEOUT_SECS", self.geocode_timeout_secs, &GEOCODE_TIMEOUT_RANGE)?;
        in_range("PAYMENT_MAX_ATTEMPTS", self.payment_max_attempts, &PAYMENT_ATTEMPTS_RANGE)?;
        if self.payment_otp.trim().is_empty() {
            return Err(AppError::Config("PAYMENT_OTP must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            api_port: 3001,
            geocode_url: "http://127.0.0.1:9/reverse-geocode".to_string(),
            geocode_timeout_secs: 10,
            cleanup_interval_secs: 3600,
            fulfilled_retention_days: 30,
            payment_otp: "123456".to_string(),
            payment_max_attempts: 3,
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("Missing env var: {key}")))
}

fn in_range<T: PartialOrd + Display>(key: &str, value: T, range: &RangeInclusive<T>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "{key}={value} is outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}
