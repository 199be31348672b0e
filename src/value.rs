// src/value.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value as it travels between the sheet and the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            Scalar::Number(_) => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_sheet_rendering() {
        assert_eq!(Scalar::from(30i64).to_string(), "30");
        assert_eq!(Scalar::from(2.5).to_string(), "2.5");
        assert_eq!(Scalar::Null.to_string(), "");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }

    #[test]
    fn test_deserialize_mixed_row() {
        let row: Vec<Scalar> = serde_json::from_str(r#"["a", 1, null]"#).unwrap();
        assert_eq!(row, vec![Scalar::from("a"), Scalar::Number(1.0), Scalar::Null]);
    }
}
