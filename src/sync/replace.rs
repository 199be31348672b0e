// src/sync/replace.rs
// Whole-table replacement: upload the sheet as CSV instead of diffing rows.

use crate::error::SyncResult;
use crate::gateway::tasks::TableAdmin;
use crate::query::escape::to_csv;
use crate::settings::SyncSettings;
use crate::sheet::Sheet;
use crate::value::Scalar;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The table still has background tasks running.
    Skipped { tasks: usize },
    /// Nothing below the header.
    Empty,
    Replaced { rows: usize },
}

pub async fn replace_rows<S: Sheet + ?Sized>(
    sheet: &S,
    admin: &dyn TableAdmin,
    settings: &SyncSettings,
) -> SyncResult<ReplaceOutcome> {
    let table = settings.table_id.as_str();
    let tasks = admin.pending_tasks(table).await?;
    if tasks > 0 {
        warn!("Table {} has {} pending tasks, skipping replace", table, tasks);
        return Ok(ReplaceOutcome::Skipped { tasks });
    }

    let values = sheet.values()?;
    if values.len() <= 1 {
        info!("Sheet has no data rows, nothing to replace in {}", table);
        return Ok(ReplaceOutcome::Empty);
    }

    let lines: Vec<Vec<String>> = values
        .iter()
        .map(|line| line.iter().map(Scalar::to_string).collect())
        .collect();
    let csv = to_csv(&lines);
    admin
        .replace_rows(table, csv, settings.require_same_columns, settings.first_data_row)
        .await?;

    let rows = values.len() - 1;
    info!("Replaced {} rows in table {}", rows, table);
    Ok(ReplaceOutcome::Replaced { rows })
}
