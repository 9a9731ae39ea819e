use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

/// A single table cell as it moves through the pipeline.
///
/// Raw input only ever produces `Null` and `Text`; the type coercer turns
/// recognised columns into `Number` and `Date`, and KPI output uses `Integer`
/// for count columns so they render without a fractional part.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
}

impl Cell {
    /// Builds a cell from raw text, treating blank strings as missing.
    pub fn from_raw(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Null
        } else {
            Cell::Text(value.to_string())
        }
    }

    /// Integer cell for a count, saturating at `i64::MAX`.
    pub fn count(value: u64) -> Self {
        Cell::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Integer(i) => i.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Integer(i) => serde_json::Value::from(*i),
            Cell::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Shortest representation that parses back to the same `f64`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // avoids rendering negative zero as "-0"
        return "0".to_string();
    }
    value.to_string()
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%d-%m-%Y",
        "%Y%m%d",
        "%d %b %Y",
        "%b %d, %Y",
    ];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed.date());
        }
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Parses a numeric cell. Non-finite values count as unparseable.
pub fn parse_number(value: &str) -> Option<f64> {
    let parsed = value.trim().parse::<f64>().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Lower-cases and trims a header so lookups ignore case and padding.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_date_supports_dates_and_datetimes() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date(" 2024/05/06 ").unwrap(), expected);
        assert_eq!(parse_naive_date("2024-05-06 00:00:00").unwrap(), expected);
        assert_eq!(parse_naive_date("2024-05-06T13:45:00").unwrap(), expected);
        assert!(parse_naive_date("not a date").is_err());
    }

    #[test]
    fn parse_number_rejects_garbage_and_non_finite() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn normalize_header_lowercases_and_trims() {
        assert_eq!(normalize_header("  Amount Spent (INR) "), "amount spent (inr)");
    }

    #[test]
    fn cell_display_round_trips_numbers() {
        let value = 0.1 + 0.2;
        let rendered = Cell::Number(value).as_display();
        assert_eq!(rendered.parse::<f64>().unwrap(), value);
        assert_eq!(Cell::Number(1000.0).as_display(), "1000");
        assert_eq!(Cell::Number(-0.0).as_display(), "0");
        assert_eq!(Cell::Integer(42).as_display(), "42");
        assert_eq!(Cell::Null.as_display(), "");
    }

    #[test]
    fn cell_from_raw_treats_blank_as_null() {
        assert!(Cell::from_raw("   ").is_null());
        assert_eq!(Cell::from_raw("x"), Cell::Text("x".into()));
    }
}
