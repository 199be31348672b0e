// src/sync/row_map.rs
// Rows keyed by rowid, plus the bucket of lines that have never been
// persisted remotely.

use crate::error::{SyncError, SyncResult};
use crate::query::statements::ROWID_COLUMN;
use crate::value::Scalar;
use std::collections::HashMap;
use tracing::warn;

/// Rowid written back when an insert did not produce one.
pub const SENTINEL_ROW_ID: &str = "-1";

/// Whether a rowid cell means "not yet persisted".
pub fn is_sentinel(value: &Scalar) -> bool {
    value.is_blank() || value.to_string().trim() == SENTINEL_ROW_ID
}

/// Column name to value, in column order. The rowid is not part of a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Scalar)>,
}

impl Row {
    pub fn new(cells: Vec<(String, Scalar)>) -> Self {
        Self { cells }
    }

    /// Value of `column`; absent columns read as null.
    pub fn get(&self, column: &str) -> &Scalar {
        static NULL: Scalar = Scalar::Null;
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .unwrap_or(&NULL)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }
}

/// A row waiting for its first insert, with the sheet line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRow {
    pub line: usize,
    pub row: Row,
}

#[derive(Debug, Clone, Default)]
pub struct RowMap {
    order: Vec<String>,
    rows: HashMap<String, Row>,
    pending: Vec<PendingRow>,
}

impl RowMap {
    /// Build a map from a header and its data lines. The last header cell
    /// must be `rowid`; `first_line` is the sheet line of `lines[0]`.
    /// Short lines are padded with nulls; cells past the last column are
    /// dropped with a warning.
    pub fn from_lines(header: &[String], lines: &[Vec<Scalar>], first_line: usize) -> SyncResult<Self> {
        match header.last() {
            Some(last) if last == ROWID_COLUMN => {}
            _ => {
                return Err(SyncError::Schema(format!(
                    "the last column must be '{}', got {:?}",
                    ROWID_COLUMN,
                    header.last()
                )))
            }
        }
        let rowid_pos = header.len() - 1;
        let data_columns = &header[..rowid_pos];

        let mut map = RowMap::default();
        for (offset, line) in lines.iter().enumerate() {
            let line_number = first_line + offset;
            if line.len() > header.len() {
                warn!(
                    "Ignoring {} cells past the last column on line {}",
                    line.len() - header.len(),
                    line_number
                );
            }
            let cell = |i: usize| line.get(i).cloned().unwrap_or_default();
            let row = Row::new(
                data_columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), cell(i)))
                    .collect(),
            );
            let row_id = cell(rowid_pos);
            if is_sentinel(&row_id) {
                map.pending.push(PendingRow { line: line_number, row });
            } else {
                map.insert(row_id.to_string().trim().to_string(), row);
            }
        }
        Ok(map)
    }

    fn insert(&mut self, row_id: String, row: Row) {
        if self.rows.insert(row_id.clone(), row).is_none() {
            self.order.push(row_id);
        }
    }

    pub fn get(&self, row_id: &str) -> Option<&Row> {
        self.rows.get(row_id)
    }

    /// Persisted rows in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|row| (id.as_str(), row)))
    }

    pub fn pending(&self) -> &[PendingRow] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.pending.is_empty()
    }
}
