// src/query/escape.rs
// Literal escaping for the query dialect and CSV encoding for bulk uploads

/// Escape backslashes and single quotes so the value can sit inside a
/// single-quoted literal.
///
/// # Example
/// ```
/// use tablesync::query::escape::escape_quotes;
/// assert_eq!(escape_quotes("O'Brien's"), "O\\'Brien\\'s");
/// ```
pub fn escape_quotes(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Wrap a value in single quotes after escaping it.
///
/// # Example
/// ```
/// use tablesync::query::escape::quote_literal;
/// assert_eq!(quote_literal("Name"), "'Name'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_quotes(value))
}

/// Encode a single CSV field. Fields containing a comma, a newline or a
/// double quote are wrapped in double quotes with inner quotes doubled.
pub fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('\n') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Encode rows as CSV: comma separated fields, CRLF between rows, no
/// terminator after the last row.
pub fn to_csv<R, S>(rows: &[R]) -> String
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    rows.iter()
        .map(|row| {
            row.as_ref()
                .iter()
                .map(|cell| csv_field(cell.as_ref()))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes("O'Brien's"), "O\\'Brien\\'s");
        assert_eq!(escape_quotes("plain"), "plain");
        assert_eq!(escape_quotes(""), "");
    }

    #[test]
    fn test_escape_backslash_before_quote() {
        // A trailing backslash must not swallow the closing quote.
        assert_eq!(escape_quotes("C:\\"), "C:\\\\");
        assert_eq!(escape_quotes("a\\'b"), "a\\\\\\'b");
    }

    #[test]
    fn test_csv_field() {
        assert_eq!(csv_field("a,b\"c"), "\"a,b\"\"c\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(csv_field("simple"), "simple");
    }

    #[test]
    fn test_to_csv_uses_crlf_without_trailer() {
        let rows = vec![
            vec!["Name".to_string(), "Note".to_string()],
            vec!["Ann".to_string(), "x,y".to_string()],
        ];
        assert_eq!(to_csv(&rows), "Name,Note\r\nAnn,\"x,y\"");
    }

    #[test]
    fn test_to_csv_empty() {
        let rows: Vec<Vec<String>> = Vec::new();
        assert_eq!(to_csv(&rows), "");
    }
}
