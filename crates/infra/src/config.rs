//! Runtime configuration loaded from the environment.

use std::net::SocketAddr;

use chrono::{FixedOffset, Local, Offset};
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 8;
pub const DEFAULT_MAX_ITEM_REPORT_DAYS: u64 = 366;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; in-memory stores are used when absent.
    pub database_url: Option<String>,
    /// Commit attempts after a version conflict before giving up.
    pub max_commit_retries: u32,
    /// Timezone that report calendar days are cut in.
    pub report_offset: FixedOffset,
    pub max_item_report_days: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            report_offset: Local::now().offset().fix(),
            max_item_report_days: DEFAULT_MAX_ITEM_REPORT_DAYS,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("HOTELSTOCK_BIND_ADDR") {
            Some(raw) => parse("HOTELSTOCK_BIND_ADDR", &raw)?,
            None => defaults.bind_addr,
        };
        let max_commit_retries = match get("HOTELSTOCK_MAX_COMMIT_RETRIES") {
            Some(raw) => parse("HOTELSTOCK_MAX_COMMIT_RETRIES", &raw)?,
            None => defaults.max_commit_retries,
        };
        let report_offset = match get("HOTELSTOCK_REPORT_UTC_OFFSET_MINUTES") {
            Some(raw) => {
                let minutes: i32 = parse("HOTELSTOCK_REPORT_UTC_OFFSET_MINUTES", &raw)?;
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| ConfigError::Invalid {
                        var: "HOTELSTOCK_REPORT_UTC_OFFSET_MINUTES",
                        reason: format!("{minutes} minutes is not a valid UTC offset"),
                    })?
            }
            None => defaults.report_offset,
        };
        let max_item_report_days = match get("HOTELSTOCK_MAX_ITEM_REPORT_DAYS") {
            Some(raw) => parse("HOTELSTOCK_MAX_ITEM_REPORT_DAYS", &raw)?,
            None => defaults.max_item_report_days,
        };
        if max_item_report_days == 0 {
            return Err(ConfigError::Invalid {
                var: "HOTELSTOCK_MAX_ITEM_REPORT_DAYS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            max_commit_retries,
            report_offset,
            max_item_report_days,
        })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: format!("'{raw}': {e}"),
    })
}
