// src/sync/mod.rs
//! Two-way reconciliation between a local sheet and a remote table.
//!
//! One pass runs `FETCH_LOCAL → FETCH_REMOTE → RECONCILE → DONE`:
//! - remote rows with a matching local rowid are updated when any column differs
//! - remote rows without a local counterpart are deleted
//! - local rows without a rowid are inserted and get the new rowid written back
//!
//! Mutations run strictly one after another with a pause in between. There
//! is no transaction: a failure leaves the table partially synchronized
//! until the next pass.

pub mod replace;
pub mod row_map;
pub mod transform;

use crate::error::{SyncError, SyncResult};
use crate::gateway::{RetryingGateway, SqlGateway};
use crate::geocode::Geocoder;
use crate::query::escape::escape_quotes;
use crate::query::statements::{
    build_delete_sql, build_insert_sql, build_select_all_sql, build_update_sql,
};
use crate::settings::SyncSettings;
use crate::sheet::{ensure_rowid_column, Sheet};
use crate::value::Scalar;
use row_map::{Row, RowMap, SENTINEL_ROW_ID};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use transform::{TransformRules, ValueTransformer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Init,
    FetchLocal,
    FetchRemote,
    Reconcile,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Init => "INIT",
            SyncPhase::FetchLocal => "FETCH_LOCAL",
            SyncPhase::FetchRemote => "FETCH_REMOTE",
            SyncPhase::Reconcile => "RECONCILE",
            SyncPhase::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Counts of what one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub unchanged: usize,
    pub updated: usize,
    pub deleted: usize,
    pub inserted: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn mutations(&self) -> usize {
        self.updated + self.deleted + self.inserted
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unchanged, {} updated, {} deleted, {} inserted, {} failed",
            self.unchanged, self.updated, self.deleted, self.inserted, self.failed
        )
    }
}

pub struct TableSynchronizer<G> {
    gateway: RetryingGateway<G>,
    rules: TransformRules,
    geocoder: Option<Arc<dyn Geocoder>>,
    table: String,
    call_interval: Duration,
}

impl<G: SqlGateway> TableSynchronizer<G> {
    pub fn new(
        settings: &SyncSettings,
        gateway: G,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> SyncResult<Self> {
        if settings.table_id.trim().is_empty() {
            return Err(SyncError::MissingConfig(
                "The sync is missing the required table_id setting".to_string(),
            ));
        }
        let rules = settings.transform_rules();
        if rules.address_column.is_some() && geocoder.is_none() {
            return Err(SyncError::MissingConfig(
                "An address_column is set but no geocoder is available".to_string(),
            ));
        }
        Ok(Self {
            gateway: RetryingGateway::new(gateway, settings.rate_limit_backoff()),
            rules,
            geocoder,
            table: settings.table_id.clone(),
            call_interval: settings.call_interval(),
        })
    }

    pub fn gateway(&self) -> &G {
        self.gateway.inner()
    }

    // Geocode lookups are cached for one pass only, so a failed lookup is
    // tried again on the next pass.
    fn pass_transformer(&self) -> ValueTransformer {
        ValueTransformer::new(self.rules.clone(), self.geocoder.clone())
    }

    /// Run one reconciliation pass. Remote rows are brought in line with the
    /// sheet; the sheet itself only receives rowids for inserted lines.
    pub async fn sync<S: Sheet + ?Sized>(&self, sheet: &mut S) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        let mut phase = SyncPhase::Init;
        debug!("Sync of table {}: {}", self.table, phase);
        let rowid_column = ensure_rowid_column(sheet)?;
        let transformer = self.pass_transformer();

        phase = SyncPhase::FetchLocal;
        debug!("Sync of table {}: {}", self.table, phase);
        let values = sheet.values()?;
        let header: Vec<String> = values
            .first()
            .map(|h| h.iter().map(Scalar::to_string).collect())
            .unwrap_or_default();
        let local = RowMap::from_lines(&header, values.get(1..).unwrap_or(&[]), 2)?;

        phase = SyncPhase::FetchRemote;
        debug!("Sync of table {}: {}", self.table, phase);
        let select = build_select_all_sql(&self.table, &header);
        let response = self.gateway.run_sql_with_retry(&select).await?;
        let remote = RowMap::from_lines(&response.columns, &response.rows, 1)?;
        if !remote.pending().is_empty() {
            warn!(
                "Ignoring {} remote rows without a rowid",
                remote.pending().len()
            );
        }

        phase = SyncPhase::Reconcile;
        debug!(
            "Sync of table {}: {} ({} remote, {} local, {} pending)",
            self.table,
            phase,
            remote.len(),
            local.len(),
            local.pending().len()
        );
        for (row_id, remote_row) in remote.iter() {
            match local.get(row_id) {
                Some(local_row) => {
                    let assignments = self.changed_columns(&transformer, remote_row, local_row).await;
                    if assignments.is_empty() {
                        report.unchanged += 1;
                        continue;
                    }
                    let sql = build_update_sql(&self.table, &assignments, row_id);
                    match self.mutate(&sql).await {
                        Ok(()) => report.updated += 1,
                        Err(e) => self.record_failure(&mut report, e)?,
                    }
                }
                None => {
                    let sql = build_delete_sql(&self.table, row_id);
                    match self.mutate(&sql).await {
                        Ok(()) => report.deleted += 1,
                        Err(e) => self.record_failure(&mut report, e)?,
                    }
                }
            }
        }

        for pending in local.pending() {
            let row_id = match self.insert_row(&transformer, &pending.row).await {
                Ok(Some(row_id)) => {
                    report.inserted += 1;
                    row_id
                }
                Ok(None) => {
                    warn!("Insert of line {} returned no rowid", pending.line);
                    report.failed += 1;
                    SENTINEL_ROW_ID.to_string()
                }
                Err(e) => {
                    self.record_failure(&mut report, e)?;
                    SENTINEL_ROW_ID.to_string()
                }
            };
            self.write_row_id(sheet, pending.line, rowid_column, row_id);
            self.wait_between_calls().await;
        }

        phase = SyncPhase::Done;
        info!("Sync of table {} {}: {}", self.table, phase, report);
        Ok(report)
    }

    /// Insert one sheet line as a new record and write its rowid back.
    /// Returns the assigned rowid, or `None` when the sentinel was written.
    pub async fn submit_row<S: Sheet + ?Sized>(
        &self,
        sheet: &mut S,
        line: usize,
    ) -> SyncResult<Option<String>> {
        let rowid_column = ensure_rowid_column(sheet)?;
        let values = sheet.values()?;
        let header: Vec<String> = values
            .first()
            .map(|h| h.iter().map(Scalar::to_string).collect())
            .unwrap_or_default();
        let cells = match values.get(line.wrapping_sub(1)) {
            Some(cells) if line >= 2 => cells,
            _ => return Err(SyncError::Sheet(format!("line {} has no data", line))),
        };
        let row = Row::new(
            header[..rowid_column - 1]
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect(),
        );

        let row_id = match self.insert_row(&self.pass_transformer(), &row).await {
            Ok(row_id) => row_id,
            Err(SyncError::Gateway(e)) if !e.is_fatal() => {
                error!("Insert of line {} failed: {}", line, e);
                None
            }
            Err(e) => return Err(e),
        };
        let written = row_id.clone().unwrap_or_else(|| SENTINEL_ROW_ID.to_string());
        sheet.set_cell(line, rowid_column, Scalar::Text(written))?;
        Ok(row_id)
    }

    /// `(column, escaped value)` for every column whose canonical local
    /// value differs from the remote one.
    async fn changed_columns(
        &self,
        transformer: &ValueTransformer,
        remote_row: &Row,
        local_row: &Row,
    ) -> Vec<(String, String)> {
        let mut assignments = Vec::new();
        for (column, remote_value) in remote_row.iter() {
            let local_value = transformer.canonical(column, local_row.get(column)).await;
            if local_value != remote_value.to_string() {
                trace!("Column '{}' differs: remote '{}' local '{}'", column, remote_value, local_value);
                assignments.push((
                    column.to_string(),
                    escape_quotes(&local_value),
                ));
            }
        }
        assignments
    }

    async fn insert_row(
        &self,
        transformer: &ValueTransformer,
        row: &Row,
    ) -> SyncResult<Option<String>> {
        let mut columns = Vec::new();
        let mut literals = Vec::new();
        for (column, value) in row.iter() {
            columns.push(column.to_string());
            literals.push(transformer.literal(column, value).await);
        }
        let sql = build_insert_sql(&self.table, &columns, &literals);
        let response = self.gateway.run_sql_with_retry(&sql).await?;
        Ok(response.inserted_row_id())
    }

    /// Run one mutation and pause afterwards whatever the outcome.
    async fn mutate(&self, sql: &str) -> SyncResult<()> {
        let result = self.gateway.run_sql_with_retry(sql).await;
        self.wait_between_calls().await;
        result.map(|_| ()).map_err(SyncError::from)
    }

    fn record_failure(&self, report: &mut SyncReport, e: SyncError) -> SyncResult<()> {
        if e.is_fatal() {
            error!("Aborting sync of table {}: {}", self.table, e);
            return Err(e);
        }
        error!("{}", e);
        report.failed += 1;
        Ok(())
    }

    fn write_row_id<S: Sheet + ?Sized>(&self, sheet: &mut S, line: usize, column: usize, row_id: String) {
        if let Err(e) = sheet.set_cell(line, column, Scalar::Text(row_id.clone())) {
            error!("Could not write rowid {} to line {}: {}", row_id, line, e);
        }
    }

    async fn wait_between_calls(&self) {
        if !self.call_interval.is_zero() {
            tokio::time::sleep(self.call_interval).await;
        }
    }
}
