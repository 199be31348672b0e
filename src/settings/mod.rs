pub mod io;

use crate::error::{SyncError, SyncResult};
use crate::gateway::http::DEFAULT_QUERY_ENDPOINT;
use crate::gateway::tasks::DEFAULT_API_BASE;
use crate::sync::transform::TransformRules;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOKEN_ENV: &str = "TABLESYNC_TOKEN";

/// Everything a sync job needs to know about its target table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Remote table identifier.
    pub table_id: String,
    /// Column whose values are geocoded into `lat,lng` before upload.
    pub address_column: Option<String>,
    /// Column whose values are normalized to `yyyy-MM-dd HH:mm:ss`.
    pub timestamp_column: Option<String>,
    pub utc_offset_minutes: i32,
    pub call_interval_ms: u64,
    pub rate_limit_backoff_ms: u64,
    pub endpoint: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub token_env: String,
    pub geocode_api_key: Option<String>,
    pub geocode_region: Option<String>,
    pub first_data_row: usize,
    pub require_same_columns: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            table_id: String::new(),
            address_column: None,
            timestamp_column: Some("Timestamp".to_string()),
            utc_offset_minutes: 0,
            call_interval_ms: 2000,
            rate_limit_backoff_ms: 2000,
            endpoint: DEFAULT_QUERY_ENDPOINT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            geocode_api_key: None,
            geocode_region: None,
            first_data_row: 2,
            require_same_columns: true,
        }
    }
}

impl SyncSettings {
    pub fn for_table(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            ..Default::default()
        }
    }

    pub fn call_interval(&self) -> Duration {
        Duration::from_millis(self.call_interval_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn transform_rules(&self) -> TransformRules {
        TransformRules {
            address_column: self.address_column.clone().filter(|c| !c.is_empty()),
            timestamp_column: self.timestamp_column.clone().filter(|c| !c.is_empty()),
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }

    /// Reject settings a pass cannot run with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.table_id.trim().is_empty() {
            return Err(SyncError::MissingConfig(
                "The sync is missing the required table_id setting".to_string(),
            ));
        }
        let has_address = self.address_column.as_deref().is_some_and(|c| !c.is_empty());
        let has_geocode_key = self.geocode_api_key.as_deref().is_some_and(|k| !k.is_empty());
        if has_address && !has_geocode_key {
            return Err(SyncError::MissingConfig(
                "Since you set an address_column, you also need a geocode_api_key".to_string(),
            ));
        }
        Ok(())
    }
}
