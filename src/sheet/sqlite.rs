// src/sheet/sqlite.rs
// A SQLite table used as the local sheet: one physical column per header
// cell plus a `row_index` key that fixes the line order.

use super::Sheet;
use crate::error::{SyncError, SyncResult};
use crate::value::Scalar;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use tracing::{debug, warn};

const ROW_INDEX: &str = "row_index";

/// Quote a SQL identifier by wrapping it in double quotes.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_scalar(value: Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Integer(i) => Scalar::Number(i as f64),
        Value::Real(f) => Scalar::Number(f),
        Value::Text(s) => Scalar::Text(s),
        Value::Blob(b) => Scalar::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}

// Columns carry TEXT affinity, so numbers are stored in their display form.
fn to_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Text(s) => Value::Text(s),
        number => Value::Text(number.to_string()),
    }
}

pub struct SqliteSheet {
    conn: Connection,
    table: String,
}

impl SqliteSheet {
    /// Open an existing database file and ensure WAL mode is enabled.
    pub fn open(path: &Path, table: &str) -> SyncResult<Self> {
        let conn = Connection::open(path)?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            warn!(
                "Failed to set WAL mode on database {:?}. Current mode: {}",
                path.file_name(),
                journal_mode
            );
        }
        conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;")?;
        Self::from_connection(conn, table)
    }

    /// Wrap a connection; the table must already exist.
    pub fn from_connection(conn: Connection, table: &str) -> SyncResult<Self> {
        let sheet = Self {
            conn,
            table: table.to_string(),
        };
        if !sheet.table_exists()? {
            return Err(SyncError::Sheet(format!("Table not found: {}", table)));
        }
        Ok(sheet)
    }

    /// Create the table with the given header and load the data lines.
    pub fn create(
        conn: Connection,
        table: &str,
        header: &[&str],
        lines: &[Vec<Scalar>],
    ) -> SyncResult<Self> {
        let mut columns = vec![format!("{} INTEGER PRIMARY KEY", ROW_INDEX)];
        columns.extend(header.iter().map(|h| format!("{} TEXT", quote_identifier(h))));
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote_identifier(table),
                columns.join(", ")
            ),
            [],
        )?;
        let sheet = Self {
            conn,
            table: table.to_string(),
        };
        for line in lines {
            sheet.append_line(line)?;
        }
        Ok(sheet)
    }

    fn table_exists(&self) -> SyncResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            params![self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Header cells in physical column order, without `row_index`.
    fn header(&self) -> SyncResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(&self.table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names.into_iter().filter(|n| n != ROW_INDEX).collect())
    }

    /// Append a data line after the current last one.
    pub fn append_line(&self, line: &[Scalar]) -> SyncResult<()> {
        let header = self.header()?;
        if line.len() > header.len() {
            return Err(SyncError::Schema(format!(
                "line has {} cells but the sheet has {} columns",
                line.len(),
                header.len()
            )));
        }
        let next_index: i64 = self.conn.query_row(
            &format!(
                "SELECT COALESCE(MAX({}), -1) + 1 FROM {}",
                ROW_INDEX,
                quote_identifier(&self.table)
            ),
            [],
            |row| row.get(0),
        )?;
        let columns: Vec<String> = std::iter::once(ROW_INDEX.to_string())
            .chain(header.iter().take(line.len()).map(|h| quote_identifier(h)))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let mut values = vec![Value::Integer(next_index)];
        values.extend(line.iter().cloned().map(to_value));
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(&self.table),
                columns.join(", "),
                placeholders
            ),
            params_from_iter(values),
        )?;
        Ok(())
    }

    fn row_index_for_line(&self, line: usize) -> SyncResult<i64> {
        let offset = (line - 2) as i64;
        self.conn
            .query_row(
                &format!(
                    "SELECT {idx} FROM {table} ORDER BY {idx} LIMIT 1 OFFSET ?",
                    idx = ROW_INDEX,
                    table = quote_identifier(&self.table)
                ),
                params![offset],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    SyncError::Sheet(format!("line {} does not exist", line))
                }
                other => other.into(),
            })
    }

    fn set_header_cell(&mut self, column: usize, name: &str) -> SyncResult<()> {
        let header = self.header()?;
        let table = quote_identifier(&self.table);
        if column == header.len() + 1 {
            debug!("Adding column '{}' to sheet '{}'", name, self.table);
            self.conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} TEXT", table, quote_identifier(name)),
                [],
            )?;
        } else if column <= header.len() {
            let current = &header[column - 1];
            if current != name {
                self.conn.execute(
                    &format!(
                        "ALTER TABLE {} RENAME COLUMN {} TO {}",
                        table,
                        quote_identifier(current),
                        quote_identifier(name)
                    ),
                    [],
                )?;
            }
        } else {
            return Err(SyncError::Sheet(format!(
                "cannot add header cell {} to a sheet with {} columns",
                column,
                header.len()
            )));
        }
        Ok(())
    }
}

impl Sheet for SqliteSheet {
    fn values(&self) -> SyncResult<Vec<Vec<Scalar>>> {
        let header = self.header()?;
        let mut values = vec![header.iter().map(|h| Scalar::from(h.as_str())).collect()];
        if header.is_empty() {
            return Ok(values);
        }

        let columns = header
            .iter()
            .map(|h| quote_identifier(h))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY {}",
            columns,
            quote_identifier(&self.table),
            ROW_INDEX
        ))?;
        let width = header.len();
        let rows = stmt.query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i).map(to_scalar))
                .collect::<Result<Vec<_>, _>>()
        })?;
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn set_cell(&mut self, line: usize, column: usize, value: Scalar) -> SyncResult<()> {
        if line == 0 || column == 0 {
            return Err(SyncError::Sheet(format!(
                "cell ({}, {}) is out of range",
                line, column
            )));
        }
        if line == 1 {
            return self.set_header_cell(column, &value.to_string());
        }

        let header = self.header()?;
        let Some(name) = header.get(column - 1) else {
            return Err(SyncError::Sheet(format!(
                "column {} is past the last column",
                column
            )));
        };
        let row_index = self.row_index_for_line(line)?;
        self.conn.execute(
            &format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                quote_identifier(&self.table),
                quote_identifier(name),
                ROW_INDEX
            ),
            params![to_value(value), row_index],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::ensure_rowid_column;

    fn sample() -> SqliteSheet {
        let conn = Connection::open_in_memory().unwrap();
        SqliteSheet::create(
            conn,
            "Responses",
            &["Name", "Age"],
            &[
                vec![Scalar::from("Ann"), Scalar::from("31")],
                vec![Scalar::from("Bo"), Scalar::from("40")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_values_start_with_header() {
        let sheet = sample();
        let values = sheet.values().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], vec![Scalar::from("Name"), Scalar::from("Age")]);
        assert_eq!(values[2], vec![Scalar::from("Bo"), Scalar::from("40")]);
    }

    #[test]
    fn test_rowid_column_is_added_and_written() {
        let mut sheet = sample();
        let rowid_col = ensure_rowid_column(&mut sheet).unwrap();
        assert_eq!(rowid_col, 3);
        sheet.set_cell(3, rowid_col, Scalar::from("17")).unwrap();
        let values = sheet.values().unwrap();
        assert_eq!(values[0][2], Scalar::from("rowid"));
        assert_eq!(values[1][2], Scalar::Null);
        assert_eq!(values[2][2], Scalar::from("17"));
    }

    #[test]
    fn test_missing_line_is_an_error() {
        let mut sheet = sample();
        assert!(sheet.set_cell(9, 1, Scalar::from("x")).is_err());
    }

    #[test]
    fn test_missing_table_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteSheet::from_connection(conn, "Nope").is_err());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.db");
        {
            let conn = Connection::open(&path).unwrap();
            SqliteSheet::create(conn, "S", &["A"], &[vec![Scalar::from("x")]]).unwrap();
        }
        let sheet = SqliteSheet::open(&path, "S").unwrap();
        assert_eq!(sheet.values().unwrap().len(), 2);
    }
}
