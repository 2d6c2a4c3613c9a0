use crate::genres::catalog::DEFAULT_REFRESH_DAYS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Runtime settings, overridable from `TALEWEAVER_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Radius used when a search does not name one
    pub default_radius_km: f64,
    /// Length of the geohash stored with each located listing
    pub geohash_precision: usize,
    /// Days between genre catalog refreshes
    pub catalog_refresh_days: i64,
    /// Shortest string that takes part in genre substring matching
    pub genre_min_match_len: usize,
    /// Base URL of the remote genre catalog
    pub catalog_url: Option<String>,
    /// Hours an item waits in a cart before a reminder is due
    pub cart_reminder_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_radius_km: 50.0,
            geohash_precision: 10,
            catalog_refresh_days: DEFAULT_REFRESH_DAYS,
            genre_min_match_len: 3,
            catalog_url: None,
            cart_reminder_hours: 24,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_radius_km: parse_or(&lookup, "TALEWEAVER_RADIUS_KM", defaults.default_radius_km)?,
            geohash_precision: parse_or(
                &lookup,
                "TALEWEAVER_GEOHASH_PRECISION",
                defaults.geohash_precision,
            )?,
            catalog_refresh_days: parse_or(
                &lookup,
                "TALEWEAVER_CATALOG_REFRESH_DAYS",
                defaults.catalog_refresh_days,
            )?,
            genre_min_match_len: parse_or(
                &lookup,
                "TALEWEAVER_GENRE_MIN_MATCH_LEN",
                defaults.genre_min_match_len,
            )?,
            catalog_url: lookup("TALEWEAVER_CATALOG_URL").filter(|url| !url.trim().is_empty()),
            cart_reminder_hours: parse_or(
                &lookup,
                "TALEWEAVER_CART_REMINDER_HOURS",
                defaults.cart_reminder_hours,
            )?,
        })
    }

    pub fn catalog_refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::days(self.catalog_refresh_days)
    }

    pub fn cart_reminder_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cart_reminder_hours)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw:?}")),
        None => Ok(default),
    }
}
