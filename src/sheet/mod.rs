// src/sheet/mod.rs
//! Local tabular sources. Line and column numbers are one-based, with the
//! header on line 1, the way a spreadsheet addresses cells.

pub mod sqlite;

use crate::error::SyncResult;
use crate::query::statements::ROWID_COLUMN;
use crate::value::Scalar;
use tracing::info;

pub use sqlite::SqliteSheet;

pub trait Sheet {
    /// Every line, header first.
    fn values(&self) -> SyncResult<Vec<Vec<Scalar>>>;

    /// Write a single cell. Writing one column past the last header cell
    /// on line 1 adds a column.
    fn set_cell(&mut self, line: usize, column: usize, value: Scalar) -> SyncResult<()>;
}

/// Make sure the last header cell is `rowid`, appending it when missing.
/// Returns the one-based index of the rowid column.
pub fn ensure_rowid_column<S: Sheet + ?Sized>(sheet: &mut S) -> SyncResult<usize> {
    let values = sheet.values()?;
    let header = values.first().map(Vec::as_slice).unwrap_or(&[]);
    let last_column = header.len();
    if header.last().map(|h| h.to_string()) == Some(ROWID_COLUMN.to_string()) {
        return Ok(last_column);
    }
    info!("Adding {} column after column {}", ROWID_COLUMN, last_column);
    sheet.set_cell(1, last_column + 1, Scalar::from(ROWID_COLUMN))?;
    Ok(last_column + 1)
}

/// In-memory grid, used for tests and for piping data between tools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    grid: Vec<Vec<Scalar>>,
}

impl MemorySheet {
    pub fn new(grid: Vec<Vec<Scalar>>) -> Self {
        Self { grid }
    }

    pub fn from_strings(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|cell| Scalar::from(*cell)).collect())
                .collect(),
        )
    }

    pub fn grid(&self) -> &[Vec<Scalar>] {
        &self.grid
    }

    pub fn cell(&self, line: usize, column: usize) -> Option<&Scalar> {
        self.grid.get(line.checked_sub(1)?)?.get(column.checked_sub(1)?)
    }
}

impl Sheet for MemorySheet {
    fn values(&self) -> SyncResult<Vec<Vec<Scalar>>> {
        Ok(self.grid.clone())
    }

    fn set_cell(&mut self, line: usize, column: usize, value: Scalar) -> SyncResult<()> {
        if line == 0 || column == 0 {
            return Err(crate::error::SyncError::Sheet(format!(
                "cell ({}, {}) is out of range",
                line, column
            )));
        }
        if self.grid.len() < line {
            self.grid.resize(line, Vec::new());
        }
        let row = &mut self.grid[line - 1];
        if row.len() < column {
            row.resize(column, Scalar::Null);
        }
        row[column - 1] = value;
        Ok(())
    }
}
