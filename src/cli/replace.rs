// src/cli/replace.rs

use super::{http_gateway, load};
use crate::error::SyncResult;
use crate::gateway::tasks::HttpTableAdmin;
use crate::sheet::SqliteSheet;
use crate::sync::replace::{replace_rows, ReplaceOutcome};
use std::path::Path;

pub async fn run(db_path: &Path, sheet_name: &str, settings_path: Option<&Path>) -> SyncResult<()> {
    let settings = load(settings_path)?;
    let sheet = SqliteSheet::open(db_path, sheet_name)?;
    let admin = HttpTableAdmin::new(http_gateway(&settings), settings.api_base.clone());

    match replace_rows(&sheet, &admin, &settings).await? {
        ReplaceOutcome::Skipped { tasks } => {
            println!("Skipped: table {} has {} pending tasks", settings.table_id, tasks)
        }
        ReplaceOutcome::Empty => println!("Sheet '{}' has no data rows", sheet_name),
        ReplaceOutcome::Replaced { rows } => {
            println!("Replaced table {} with {} rows", settings.table_id, rows)
        }
    }
    Ok(())
}
