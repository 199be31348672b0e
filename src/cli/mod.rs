// src/cli/mod.rs
// Command line entry points: query rendering and the sync jobs.

pub mod query;
pub mod replace;
pub mod sync;

use crate::error::{SyncError, SyncResult};
use crate::gateway::http::{EnvTokenProvider, HttpSqlGateway};
use crate::geocode::{Geocoder, HttpGeocoder};
use crate::settings::{io::load_settings, SyncSettings};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "tablesync")]
#[command(about = "Table service query builder and sheet synchronization", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the select query for a column selection
    Query(query::QueryArgs),

    /// Reconcile the remote table with a local sheet
    Sync {
        /// Path to the SQLite database holding the sheet
        #[arg(long)]
        db: PathBuf,
        /// Table inside the database used as the sheet
        #[arg(long)]
        sheet: String,
        /// Settings file (defaults to the per-user config)
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Insert a single sheet line and write its rowid back
    Submit {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        sheet: String,
        /// One-based sheet line, the header being line 1
        #[arg(long)]
        line: usize,
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Replace every remote row with the sheet contents
    Replace {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        sheet: String,
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

pub(crate) fn load(settings_path: Option<&Path>) -> SyncResult<SyncSettings> {
    let settings = load_settings(settings_path)?;
    settings.validate()?;
    Ok(settings)
}

pub(crate) fn http_gateway(settings: &SyncSettings) -> Arc<HttpSqlGateway> {
    Arc::new(HttpSqlGateway::new(
        settings.endpoint.clone(),
        settings.api_key.clone(),
        Arc::new(EnvTokenProvider::new(settings.token_env.clone())),
    ))
}

pub(crate) fn geocoder(settings: &SyncSettings) -> SyncResult<Option<Arc<dyn Geocoder>>> {
    if settings.transform_rules().address_column.is_none() {
        return Ok(None);
    }
    let key = settings
        .geocode_api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| SyncError::MissingConfig("geocode_api_key".to_string()))?;
    let geocoder = HttpGeocoder::new(key).with_region(settings.geocode_region.clone());
    Ok(Some(Arc::new(geocoder)))
}
