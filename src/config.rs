use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use log::{info, warn};
use thiserror::Error;

use crate::catalog::Cents;
use crate::pricing::{DEFAULT_DELIVERY_FEE, DEFAULT_TAX_PERCENT, PricingRules};
use crate::saving::DEFAULT_GUEST_CART_DAYS;

const SESSION_HOURS: RangeInclusive<i64> = 1..=24 * 365;
const GUEST_CART_DAYS: RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Incomplete SMTP settings: {0} is not set")]
    IncompleteSmtp(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub pricing: PricingRules,
    pub session_hours: i64,
    /// Guest carts older than this are pruned at startup.
    pub guest_cart_days: i64,
    /// Operator token for the status update route; unset disables the route.
    pub admin_token: Option<String>,
    /// `None` falls back to logging reset codes.
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir: PathBuf::from("database"),
            pricing: PricingRules::default(),
            session_hours: 24,
            guest_cart_days: DEFAULT_GUEST_CART_DAYS,
            admin_token: None,
            smtp: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tax_percent: u32 = try_load(&lookup, "CAME_TAX_PERCENT", DEFAULT_TAX_PERCENT)?;
        let delivery_fee: Cents =
            try_load(&lookup, "CAME_DELIVERY_FEE_CENTS", DEFAULT_DELIVERY_FEE)?;
        let session_hours = within(
            "CAME_SESSION_HOURS",
            try_load(&lookup, "CAME_SESSION_HOURS", 24)?,
            SESSION_HOURS,
        )?;
        let guest_cart_days = within(
            "CAME_GUEST_CART_DAYS",
            try_load(&lookup, "CAME_GUEST_CART_DAYS", DEFAULT_GUEST_CART_DAYS)?,
            GUEST_CART_DAYS,
        )?;

        Ok(Config {
            host: try_load(&lookup, "CAME_HOST", "127.0.0.1".to_string())?,
            port: try_load(&lookup, "CAME_PORT", 3000)?,
            data_dir: PathBuf::from(try_load(&lookup, "CAME_DATA_DIR", "database".to_string())?),
            pricing: PricingRules {
                tax_percent,
                delivery_fee,
            },
            session_hours,
            guest_cart_days,
            admin_token: non_empty(&lookup, "CAME_ADMIN_TOKEN"),
            smtp: load_smtp(&lookup)?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn try_load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match non_empty(lookup, key) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!("Invalid {key} value: {e}");
                Err(ConfigError::Invalid {
                    key,
                    value,
                    reason: e.to_string(),
                })
            }
        },
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn within(key: &'static str, value: i64, range: RangeInclusive<i64>) -> Result<i64, ConfigError> {
    if range.contains(&value) {
        return Ok(value);
    }

    Err(ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: format!("must be between {} and {}", range.start(), range.end()),
    })
}

fn load_smtp(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<SmtpConfig>, ConfigError> {
    let keys = [
        "CAME_SMTP_HOST",
        "CAME_SMTP_USER",
        "CAME_SMTP_PASSWORD",
        "CAME_SMTP_FROM",
    ];
    let values: Vec<Option<String>> = keys.iter().map(|key| non_empty(lookup, key)).collect();

    if values.iter().all(Option::is_none) {
        info!("SMTP not configured, reset codes will be logged");
        return Ok(None);
    }

    if let Some(missing) = keys.iter().zip(&values).find(|(_, v)| v.is_none()) {
        return Err(ConfigError::IncompleteSmtp(*missing.0));
    }

    let mut values = values.into_iter().flatten();
    let mut next = || values.next().unwrap_or_default();

    Ok(Some(SmtpConfig {
        host: next(),
        user: next(),
        password: next(),
        from: next(),
    }))
}
