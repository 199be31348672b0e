// src/sync/transform.rs
// Column-keyed value rules applied before comparison and before a value is
// written into a query literal.

use crate::geocode::{Geocoder, UNKNOWN_LOCATION};
use crate::query::escape::escape_quotes;
use crate::value::Scalar;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRules {
    pub address_column: Option<String>,
    pub timestamp_column: Option<String>,
    /// Offset applied to timestamps that carry their own zone.
    pub utc_offset_minutes: i32,
}

/// Normalize a timestamp cell to `yyyy-MM-dd HH:mm:ss`. Numbers are read as
/// spreadsheet serial dates (days since 1899-12-30).
pub fn normalize_timestamp(value: &Scalar, utc_offset_minutes: i32) -> Option<String> {
    match value {
        Scalar::Null => None,
        Scalar::Number(days) => {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
            let millis = (days * 86_400_000.0).round() as i64;
            let at = epoch.checked_add_signed(Duration::milliseconds(millis))?;
            Some(at.format(TIMESTAMP_FORMAT).to_string())
        }
        Scalar::Text(text) => {
            let text = text.trim();
            if let Ok(at) = DateTime::parse_from_rfc3339(text) {
                let zone = FixedOffset::east_opt(utc_offset_minutes * 60)?;
                return Some(at.with_timezone(&zone).format(TIMESTAMP_FORMAT).to_string());
            }
            if let Some(at) = NAIVE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
            {
                return Some(at.format(TIMESTAMP_FORMAT).to_string());
            }
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        }
    }
}

pub struct ValueTransformer {
    rules: TransformRules,
    geocoder: Option<Arc<dyn Geocoder>>,
    // Lookups repeat for unchanged rows within a pass.
    geocoded: Mutex<HashMap<String, String>>,
}

impl ValueTransformer {
    pub fn new(rules: TransformRules, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self {
            rules,
            geocoder,
            geocoded: Mutex::new(HashMap::new()),
        }
    }

    pub fn rules(&self) -> &TransformRules {
        &self.rules
    }

    fn is_column(rule: &Option<String>, column: &str) -> bool {
        rule.as_deref() == Some(column)
    }

    /// Canonical text for the value: geocoded for the address column,
    /// normalized for the timestamp column, stringified otherwise.
    pub async fn canonical(&self, column: &str, value: &Scalar) -> String {
        if Self::is_column(&self.rules.address_column, column) {
            return self.geocode(&value.to_string()).await;
        }
        if Self::is_column(&self.rules.timestamp_column, column) {
            return match normalize_timestamp(value, self.rules.utc_offset_minutes) {
                Some(ts) => ts,
                None => {
                    if !value.is_blank() {
                        warn!("Could not parse timestamp '{}' in column '{}'", value, column);
                    }
                    value.to_string()
                }
            };
        }
        value.to_string()
    }

    /// Canonical text, escaped for a single-quoted literal.
    pub async fn literal(&self, column: &str, value: &Scalar) -> String {
        escape_quotes(&self.canonical(column, value).await)
    }

    async fn geocode(&self, address: &str) -> String {
        if let Ok(cache) = self.geocoded.lock() {
            if let Some(hit) = cache.get(address) {
                return hit.clone();
            }
        }
        let Some(geocoder) = self.geocoder.as_ref() else {
            warn!("No geocoder configured for address column, keeping '{}'", address);
            return address.to_string();
        };
        let location = geocoder.geocode(address).await;
        // The fallback is not an answer; ask again for the next row.
        if location != UNKNOWN_LOCATION {
            if let Ok(mut cache) = self.geocoded.lock() {
                cache.insert(address.to_string(), location.clone());
            }
        }
        location
    }
}
