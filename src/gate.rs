//! Admission check run over an uploaded table before the pipeline.
//!
//! Checks run in a fixed order and the first failing one rejects the table.
//! Column names are matched after trimming and lower-casing, but no synonym
//! mapping happens here: a platform export with its own headers has to skip
//! the gate.

use std::collections::HashSet;

use log::{info, warn};
use thiserror::Error;

use crate::{
    config::ValidationConfig,
    data::{normalize_header, parse_naive_date, parse_number},
    pipeline::{ACCOUNT_ID, CAMPAIGN_ID, CLICKS, DATE, IMPRESSIONS, PURCHASES, REVENUE, SPEND},
    source::RawTable,
};

pub const REQUIRED_COLUMNS: &[&str] = &[ACCOUNT_ID, CAMPAIGN_ID, DATE, SPEND, IMPRESSIONS, CLICKS];

const NON_NEGATIVE: &[&str] = &[SPEND, IMPRESSIONS, CLICKS];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateError {
    #[error("Input table is empty")]
    Empty,
    #[error("Insufficient columns. Found {found}, need at least {required}")]
    TooFewColumns { found: usize, required: usize },
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Column '{column}' has {count} non-numeric value(s), first '{example}'")]
    NonNumeric {
        column: String,
        count: usize,
        example: String,
    },
    #[error("Negative values found in {0} column")]
    Negative(String),
    #[error("Date column contains {count} invalid date value(s), first '{example}'")]
    InvalidDates { count: usize, example: String },
    #[error("{0} column contains empty values")]
    EmptyIdentifiers(String),
    #[error("{0} record(s) with clicks > impressions (impossible)")]
    ClicksExceedImpressions(usize),
}

/// An accepted table and the data-quality warnings raised while checking it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Admission {
    pub warnings: Vec<String>,
}

impl Admission {
    pub fn message(&self) -> String {
        if self.warnings.is_empty() {
            "Validation successful".to_string()
        } else {
            format!("Validation successful (Warnings: {})", self.warnings.join("; "))
        }
    }
}

pub fn admit(table: &RawTable, config: &ValidationConfig) -> Result<Admission, GateError> {
    if table.is_empty() {
        return Err(GateError::Empty);
    }
    if table.headers.len() < REQUIRED_COLUMNS.len() {
        return Err(GateError::TooFewColumns {
            found: table.headers.len(),
            required: REQUIRED_COLUMNS.len(),
        });
    }

    let view = NormalizedView::new(table);
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|column| view.index(column).is_none())
        .map(|column| column.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(GateError::MissingColumns(missing));
    }

    let mut numeric = NON_NEGATIVE.to_vec();
    numeric.extend([PURCHASES, REVENUE].iter().filter(|c| view.index(c).is_some()));
    for column in numeric {
        let values = view.numbers(column)?;
        if NON_NEGATIVE.contains(&column) && values.iter().flatten().any(|v| *v < 0.0) {
            return Err(GateError::Negative(column.to_string()));
        }
    }

    check_dates(&view)?;

    for column in [ACCOUNT_ID, CAMPAIGN_ID] {
        if view.values(column).any(|v| v.trim().is_empty()) {
            return Err(GateError::EmptyIdentifiers(column.to_string()));
        }
    }

    let clicks = view.numbers(CLICKS)?;
    let impressions = view.numbers(IMPRESSIONS)?;
    // rows without impressions carry no ratio and are not judged here
    let impossible = clicks
        .iter()
        .zip(&impressions)
        .filter(|(c, i)| matches!((c, i), (Some(c), Some(i)) if *i > 0.0 && c > i))
        .count();
    if impossible > 0 {
        return Err(GateError::ClicksExceedImpressions(impossible));
    }

    let admission = Admission {
        warnings: collect_warnings(&view, config)?,
    };
    for warning in &admission.warnings {
        warn!("{warning}");
    }
    info!("Admitted {} row(s)", table.len());
    Ok(admission)
}

fn check_dates(view: &NormalizedView<'_>) -> Result<(), GateError> {
    let invalid = view
        .values(DATE)
        .filter(|v| !v.trim().is_empty() && parse_naive_date(v).is_err())
        .collect::<Vec<_>>();
    match invalid.first() {
        Some(example) => Err(GateError::InvalidDates {
            count: invalid.len(),
            example: example.to_string(),
        }),
        None => Ok(()),
    }
}

fn collect_warnings(
    view: &NormalizedView<'_>,
    config: &ValidationConfig,
) -> Result<Vec<String>, GateError> {
    let table = view.table;
    let mut warnings = Vec::new();

    let empty_rows = table
        .rows
        .iter()
        .filter(|row| row.iter().all(|v| v.trim().is_empty()))
        .count();
    if empty_rows > 0 {
        warnings.push(format!("{empty_rows} completely empty rows found"));
    }

    for (idx, name) in view.headers.iter().enumerate() {
        let missing = table
            .rows
            .iter()
            .filter(|row| row[idx].trim().is_empty())
            .count();
        let ratio = missing as f64 / table.len() as f64;
        if ratio > config.missing_ratio_warning {
            warnings.push(format!("{name} has {:.1}% missing values", ratio * 100.0));
        }
    }

    let mut seen = HashSet::new();
    let duplicates = table
        .rows
        .iter()
        .filter(|row| !seen.insert(row.as_slice()))
        .count();
    if duplicates > 0 {
        warnings.push(format!("{duplicates} duplicate rows found"));
    }

    let spend = view.numbers(SPEND)?;
    let clicks = view.numbers(CLICKS)?;
    let expensive = spend
        .iter()
        .zip(&clicks)
        .filter_map(|(s, c)| match (s, c) {
            (Some(s), Some(c)) if *c > 0.0 => Some(s / c),
            _ => None,
        })
        .filter(|cpc| *cpc > config.max_plausible_cpc)
        .count();
    if expensive > 0 {
        warnings.push(format!(
            "{expensive} records with CPC > {} (potential data quality issue)",
            config.max_plausible_cpc
        ));
    }

    Ok(warnings)
}

/// The raw table seen through trimmed, lower-cased header names. The first
/// column wins when two headers normalize to the same name.
struct NormalizedView<'a> {
    table: &'a RawTable,
    headers: Vec<String>,
}

impl<'a> NormalizedView<'a> {
    fn new(table: &'a RawTable) -> Self {
        Self {
            table,
            headers: table.headers.iter().map(|h| normalize_header(h)).collect(),
        }
    }

    fn index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    fn values(&self, column: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let idx = self.index(column);
        let table = self.table;
        table
            .rows
            .iter()
            .filter_map(move |row| idx.map(|i| row[i].as_str()))
    }

    /// Parsed values of a numeric column; blank cells are `None`.
    fn numbers(&self, column: &str) -> Result<Vec<Option<f64>>, GateError> {
        let mut parsed = Vec::with_capacity(self.table.len());
        let mut bad = Vec::new();
        for value in self.values(column) {
            if value.trim().is_empty() {
                parsed.push(None);
                continue;
            }
            match parse_number(value) {
                Some(number) => parsed.push(Some(number)),
                None => {
                    bad.push(value);
                    parsed.push(None);
                }
            }
        }
        match bad.first() {
            Some(example) => Err(GateError::NonNumeric {
                column: column.to_string(),
                count: bad.len(),
                example: example.to_string(),
            }),
            None => Ok(parsed),
        }
    }
}
