// src/query/statements.rs
// Mutation statements used by the synchronizer. Values handed in here are
// expected to be escaped already; column names are escaped here.

use super::escape::escape_quotes;
use super::{ColumnModel, ColumnSpec, QueryRequest};

/// Name of the server-assigned row identifier column.
pub const ROWID_COLUMN: &str = "rowid";

/// Build a select of every listed column, e.g.
/// `select 'Name', 'Age', 'rowid' from 1x2y`.
pub fn build_select_all_sql(table: &str, columns: &[String]) -> String {
    let model = ColumnModel::from_specs(columns.iter().map(ColumnSpec::new));
    QueryRequest::new(table, model).build()
}

/// Build an INSERT statement.
///
/// # Example
/// ```
/// use tablesync::query::statements::build_insert_sql;
/// let cols = vec!["Name".to_string(), "Age".to_string()];
/// let vals = vec!["Ann".to_string(), "31".to_string()];
/// assert_eq!(
///     build_insert_sql("T", &cols, &vals),
///     "INSERT INTO T ('Name','Age') VALUES ('Ann','31')"
/// );
/// ```
pub fn build_insert_sql(table: &str, columns: &[String], escaped_values: &[String]) -> String {
    let cols = columns
        .iter()
        .map(|c| escape_quotes(c))
        .collect::<Vec<_>>()
        .join("','");
    format!(
        "INSERT INTO {} ('{}') VALUES ('{}')",
        table,
        cols,
        escaped_values.join("','")
    )
}

/// Build an UPDATE statement setting every pair, keyed by rowid.
///
/// # Example
/// ```
/// use tablesync::query::statements::build_update_sql;
/// let sets = vec![("Name".to_string(), "Bo".to_string())];
/// assert_eq!(
///     build_update_sql("T", &sets, "7"),
///     "UPDATE T SET 'Name' = 'Bo' WHERE rowid = '7'"
/// );
/// ```
pub fn build_update_sql(table: &str, assignments: &[(String, String)], row_id: &str) -> String {
    let sets = assignments
        .iter()
        .map(|(column, value)| format!("'{}' = '{}'", escape_quotes(column), value))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "UPDATE {} SET {} WHERE {} = '{}'",
        table,
        sets,
        ROWID_COLUMN,
        escape_quotes(row_id)
    )
}

/// Build a DELETE statement keyed by rowid.
pub fn build_delete_sql(table: &str, row_id: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = '{}'",
        table,
        ROWID_COLUMN,
        escape_quotes(row_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_select_all_sql() {
        let cols = vec!["Name".to_string(), "rowid".to_string()];
        assert_eq!(build_select_all_sql("T", &cols), "select 'Name', 'rowid' from T");
    }

    #[test]
    fn test_build_insert_sql_escapes_columns() {
        let cols = vec!["Owner's name".to_string()];
        let vals = vec!["O\\'Brien".to_string()];
        assert_eq!(
            build_insert_sql("T", &cols, &vals),
            "INSERT INTO T ('Owner\\'s name') VALUES ('O\\'Brien')"
        );
    }

    #[test]
    fn test_build_update_sql_joins_pairs() {
        let sets = vec![
            ("Name".to_string(), "Bo".to_string()),
            ("Age".to_string(), "40".to_string()),
        ];
        assert_eq!(
            build_update_sql("T", &sets, "12"),
            "UPDATE T SET 'Name' = 'Bo','Age' = '40' WHERE rowid = '12'"
        );
    }

    #[test]
    fn test_build_delete_sql() {
        assert_eq!(build_delete_sql("T", "3"), "DELETE FROM T WHERE rowid = '3'");
    }
}
