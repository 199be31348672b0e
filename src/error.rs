// src/error.rs

use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Schema mismatch: {0}")]
    Schema(String),
    #[error("Sheet error: {0}")]
    Sheet(String),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Errors that end the whole pass instead of just the current row.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Gateway(e) => e.is_fatal(),
            SyncError::MissingConfig(_) => true,
            _ => false,
        }
    }
}
