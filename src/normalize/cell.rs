use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date_util::{from_serial, parse_date_str};
use crate::error::{Error, Result};

/// One spreadsheet cell as delivered by the sheet API or a file export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    /// Build a cell from a CSV field: empty stays empty, finite numbers become numbers.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(field.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Lenient numeric coercion. Anything that is not a finite, non-negative
    /// number (after stripping currency and grouping marks) is 0.
    pub fn as_amount(&self) -> f64 {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | '%') && !c.is_whitespace())
                    .collect();
                cleaned.parse::<f64>().unwrap_or(0.0)
            }
            Cell::Empty | Cell::Bool(_) => 0.0,
        };
        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }

    /// Like [`Cell::as_amount`], truncated to a whole count.
    pub fn as_count(&self) -> u64 {
        self.as_amount().trunc() as u64
    }

    pub fn as_date(&self) -> Result<NaiveDate> {
        match self {
            Cell::Number(n) => {
                from_serial(*n).ok_or_else(|| Error::DateParse(format!("bad serial: {n}")))
            }
            Cell::Text(s) => parse_date_str(s),
            Cell::Empty => Err(Error::DateParse("empty date".into())),
            Cell::Bool(b) => Err(Error::DateParse(format!("not a date: {b}"))),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_mixed_row() {
        let row: Vec<Cell> =
            serde_json::from_str(r#"["2025-01-02", 12, null, "7", true, 3.5]"#).unwrap();
        assert_eq!(row[0], Cell::Text("2025-01-02".into()));
        assert_eq!(row[1], Cell::Number(12.0));
        assert_eq!(row[2], Cell::Empty);
        assert_eq!(row[3], Cell::Text("7".into()));
        assert_eq!(row[4], Cell::Bool(true));
        assert_eq!(row[5], Cell::Number(3.5));
    }

    #[test]
    fn test_amount_strips_currency() {
        assert_eq!(Cell::from("$1,250.50").as_amount(), 1250.5);
        assert_eq!(Cell::from(" 42 ").as_amount(), 42.0);
    }

    #[test]
    fn test_garbage_coerces_to_zero() {
        assert_eq!(Cell::from("n/a").as_count(), 0);
        assert_eq!(Cell::from("").as_count(), 0);
        assert_eq!(Cell::Empty.as_count(), 0);
        assert_eq!(Cell::Bool(true).as_count(), 0);
        assert_eq!(Cell::Number(f64::NAN).as_count(), 0);
        assert_eq!(Cell::Number(f64::INFINITY).as_amount(), 0.0);
        assert_eq!(Cell::Number(-5.0).as_count(), 0);
        assert_eq!(Cell::from("#DIV/0!").as_amount(), 0.0);
    }

    #[test]
    fn test_count_truncates() {
        assert_eq!(Cell::Number(7.9).as_count(), 7);
    }

    #[test]
    fn test_from_field() {
        assert_eq!(Cell::from_field(""), Cell::Empty);
        assert_eq!(Cell::from_field("45292"), Cell::Number(45292.0));
        assert_eq!(Cell::from_field("inf"), Cell::Text("inf".into()));
        assert_eq!(Cell::from_field("Chris"), Cell::Text("Chris".into()));
    }

    #[test]
    fn test_as_date_variants() {
        let serial = Cell::Number(45292.0).as_date().unwrap();
        let iso = Cell::from("2024-01-01").as_date().unwrap();
        assert_eq!(serial, iso);
        assert!(Cell::Empty.as_date().is_err());
        assert!(Cell::Bool(false).as_date().is_err());
    }
}
