// src/query/layer.rs
// Filter helpers for map-layer style queries: text search, distinct values.

use super::escape::quote_literal;

/// Join two WHERE fragments with `AND`, dropping empty ones.
pub fn combine_filters(base: Option<&str>, extra: Option<&str>) -> Option<String> {
    let base = base.map(str::trim).filter(|f| !f.is_empty());
    let extra = extra.map(str::trim).filter(|f| !f.is_empty());
    match (base, extra) {
        (Some(b), Some(e)) => Some(format!("{} AND {}", b, e)),
        (Some(f), None) | (None, Some(f)) => Some(f.to_string()),
        (None, None) => None,
    }
}

/// `'<column>' CONTAINS IGNORING CASE '<text>'`
pub fn contains_ignoring_case(column: &str, text: &str) -> String {
    format!(
        "{} CONTAINS IGNORING CASE {}",
        quote_literal(column),
        quote_literal(text)
    )
}

/// Distinct values of one column with their counts, used to populate a
/// value picker.
pub fn distinct_values_query(table: &str, column: &str, filter: Option<&str>) -> String {
    let column = quote_literal(column);
    let mut query = format!("SELECT {},COUNT() FROM {}", column, table);
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        query.push_str(" WHERE ");
        query.push_str(filter);
    }
    query.push_str(" GROUP BY ");
    query.push_str(&column);
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_filters() {
        assert_eq!(
            combine_filters(Some("a > 1"), Some("b < 2")).as_deref(),
            Some("a > 1 AND b < 2")
        );
        assert_eq!(combine_filters(None, Some("b < 2")).as_deref(), Some("b < 2"));
        assert_eq!(combine_filters(Some("  "), None), None);
    }

    #[test]
    fn test_contains_ignoring_case_escapes_text() {
        assert_eq!(
            contains_ignoring_case("Name", "O'Hara"),
            "'Name' CONTAINS IGNORING CASE 'O\\'Hara'"
        );
    }

    #[test]
    fn test_distinct_values_query() {
        assert_eq!(
            distinct_values_query("T", "State", None),
            "SELECT 'State',COUNT() FROM T GROUP BY 'State'"
        );
        assert_eq!(
            distinct_values_query("T", "State", Some("pop > 5")),
            "SELECT 'State',COUNT() FROM T WHERE pop > 5 GROUP BY 'State'"
        );
    }
}
