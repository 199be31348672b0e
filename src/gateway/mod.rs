// src/gateway/mod.rs
//! SQL execution against the remote table service.
//!
//! - `SqlGateway` is the transport seam; `http::HttpSqlGateway` is the real one
//! - Failures come back typed, so callers decide on retry by inspecting the kind
//! - `RetryingGateway` retries a rate-limited statement exactly once

pub mod http;
pub mod tasks;

use crate::value::Scalar;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Guidance attached to column mismatch errors.
pub const COLUMN_MISMATCH_HINT: &str =
    "Looks like the column names in the form/source do not match the column names in the table. Make sure these match!";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("The sync has exceeded rate limits")]
    RateLimited,
    #[error("Problem running SQL: {sql}: {message}. {hint}", hint = COLUMN_MISMATCH_HINT)]
    MalformedQuery { sql: String, message: String },
    #[error("Authentication failed: {0}")]
    AuthFailure(String),
    #[error("Problem running SQL: {sql}: {message}.")]
    Other { sql: String, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Auth exhaustion ends the pass; everything else is per statement.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::AuthFailure(_))
    }
}

/// Map a service error message onto the error taxonomy.
pub fn classify_error(sql: &str, message: &str) -> GatewayError {
    if message.contains("Rate Limit Exceeded") || message.contains("rateLimitExceeded") {
        return GatewayError::RateLimited;
    }
    if message.contains("Invalid Credentials") || message.contains("authError") {
        return GatewayError::AuthFailure(message.to_string());
    }
    if message.contains("Bad column reference") || mentions_missing_column(message) {
        return GatewayError::MalformedQuery {
            sql: sql.to_string(),
            message: message.to_string(),
        };
    }
    GatewayError::Other {
        sql: sql.to_string(),
        message: message.to_string(),
    }
}

/// `Column <name> does not exist`
fn mentions_missing_column(message: &str) -> bool {
    message
        .find("Column ")
        .map(|start| message[start..].contains(" does not exist"))
        .unwrap_or(false)
}

/// Statements sent as GET; everything else is a mutation sent as POST.
pub fn is_read_statement(sql: &str) -> bool {
    let lower = sql.trim_start().to_ascii_lowercase();
    lower.starts_with("select") || lower.starts_with("show") || lower.starts_with("describe")
}

/// Rows returned by the service. For INSERT, `rows[0][0]` is the new rowid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableResponse {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Scalar>>,
}

impl TableResponse {
    /// The rowid assigned by an INSERT, if any.
    pub fn inserted_row_id(&self) -> Option<String> {
        self.rows
            .first()
            .and_then(|row| row.first())
            .filter(|v| !v.is_blank())
            .map(|v| v.to_string())
    }
}

#[async_trait]
pub trait SqlGateway: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<TableResponse, GatewayError>;
}

#[async_trait]
impl<G: SqlGateway + ?Sized> SqlGateway for std::sync::Arc<G> {
    async fn execute(&self, sql: &str) -> Result<TableResponse, GatewayError> {
        (**self).execute(sql).await
    }
}

/// Runs statements with a single retry after a fixed backoff when the
/// service signals a rate limit.
pub struct RetryingGateway<G> {
    inner: G,
    backoff: Duration,
}

impl<G: SqlGateway> RetryingGateway<G> {
    pub fn new(inner: G, backoff: Duration) -> Self {
        Self { inner, backoff }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub async fn run_sql_with_retry(&self, sql: &str) -> Result<TableResponse, GatewayError> {
        match self.inner.execute(sql).await {
            Err(GatewayError::RateLimited) => {
                debug!("Rate limited, retrying after {:?}", self.backoff);
                tokio::time::sleep(self.backoff).await;
                self.inner.execute(sql).await.map_err(|e| {
                    warn!("Retry failed for statement: {}", sql);
                    e
                })
            }
            other => other,
        }
    }
}
