// src/cli/sync.rs

use super::{geocoder, http_gateway, load};
use crate::error::SyncResult;
use crate::sheet::SqliteSheet;
use crate::sync::TableSynchronizer;
use std::path::Path;

pub async fn run(db_path: &Path, sheet_name: &str, settings_path: Option<&Path>) -> SyncResult<()> {
    let settings = load(settings_path)?;
    let mut sheet = SqliteSheet::open(db_path, sheet_name)?;
    let sync = TableSynchronizer::new(&settings, http_gateway(&settings), geocoder(&settings)?)?;

    println!("Syncing '{}' with table {}", sheet_name, settings.table_id);
    let report = sync.sync(&mut sheet).await?;
    println!("{}", report);
    Ok(())
}

pub async fn submit(
    db_path: &Path,
    sheet_name: &str,
    line: usize,
    settings_path: Option<&Path>,
) -> SyncResult<()> {
    let settings = load(settings_path)?;
    let mut sheet = SqliteSheet::open(db_path, sheet_name)?;
    let sync = TableSynchronizer::new(&settings, http_gateway(&settings), geocoder(&settings)?)?;

    match sync.submit_row(&mut sheet, line).await? {
        Some(row_id) => println!("Line {} inserted as rowid {}", line, row_id),
        None => println!("Line {} could not be inserted", line),
    }
    Ok(())
}
