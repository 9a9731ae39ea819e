//! Normalization pipeline from a raw table to the canonical campaign table.
//!
//! Stages run in a fixed order, each consuming the previous stage's [`Frame`]
//! and returning a new one together with the advisories it raised:
//!
//! 1. [`normalize`]: column names to canonical names
//! 2. [`coerce`]: text cells to dates and numbers
//! 3. [`missing`]: zero-fill metrics, drop keyless rows, default labels
//! 4. [`dedup`]: drop repeated natural keys
//! 5. [`repair`]: cross-field consistency fixes
//! 6. [`synthesize`]: required fields the source did not carry, then sort
//!
//! Nothing is shared between runs; [`run`] builds every table from scratch.

pub mod coerce;
pub mod dedup;
pub mod missing;
pub mod normalize;
pub mod repair;
pub mod synthesize;

use std::fmt;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::{AppConfig, DEFAULT_ACCOUNT_ID},
    data::Cell,
    record::CanonicalTable,
    source::RawTable,
};

use self::normalize::SynonymTable;

pub const ACCOUNT_ID: &str = "account_id";
pub const CAMPAIGN_ID: &str = "campaign_id";
pub const CAMPAIGN_NAME: &str = "campaign_name";
pub const DATE: &str = "date";
pub const SPEND: &str = "spend";
pub const IMPRESSIONS: &str = "impressions";
pub const CLICKS: &str = "clicks";
pub const PURCHASES: &str = "purchases";
pub const REVENUE: &str = "revenue";
pub const RESULTS: &str = "results";
pub const AD_ID: &str = "ad_id";
pub const AD_NAME: &str = "ad_name";
pub const OBJECTIVE: &str = "objective";
pub const CREATIVE_ID: &str = "creative_id";

pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("required column '{0}' is missing and cannot be synthesized")]
    MissingColumn(&'static str),
}

/// Rounds a metric to the whole count a record stores; negative and
/// non-finite values count as zero.
pub(crate) fn whole_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// One row of a [`Frame`]. `ordinal` is the row's position in the raw input
/// and survives filtering, so ids derived from it are stable per input.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub ordinal: usize,
    pub cells: Vec<Cell>,
}

/// Column-named table of cells threaded through the stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<FrameRow>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<FrameRow>) -> Self {
        Self { columns, rows }
    }

    pub fn from_raw(raw: RawTable) -> Self {
        let rows = raw
            .rows
            .into_iter()
            .enumerate()
            .map(|(ordinal, row)| FrameRow {
                ordinal,
                cells: row.iter().map(|value| Cell::from_raw(value)).collect(),
            })
            .collect();
        Self {
            columns: raw.headers,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [FrameRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rename_columns(&mut self, columns: Vec<String>) {
        debug_assert_eq!(columns.len(), self.columns.len());
        self.columns = columns;
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r.cells[idx])
    }

    /// Numeric value of a cell, zero for missing or non-numeric cells.
    pub fn number(row: &FrameRow, idx: usize) -> f64 {
        row.cells[idx].as_number().unwrap_or(0.0)
    }

    /// Appends a column whose values are computed from each row.
    pub fn push_column<F>(&mut self, name: &str, mut value: F)
    where
        F: FnMut(&FrameRow, &[String]) -> Cell,
    {
        let columns = self.columns.clone();
        for row in &mut self.rows {
            let cell = value(row, &columns);
            row.cells.push(cell);
        }
        self.columns.push(name.to_string());
    }

    pub fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&FrameRow) -> bool,
    {
        self.rows.retain(keep);
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<FrameRow>) {
        (self.columns, self.rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    ConflictingColumn,
    UnparseableValues,
    NegativeClipped,
    MetricsZeroFilled,
    RowsDropped,
    LabelsDefaulted,
    DuplicatesRemoved,
    ClicksCapped,
    NegativeSpend,
    PurchasesInferred,
    FieldSynthesized,
    EmptyResult,
}

impl AdvisoryKind {
    /// Whether the advisory reports data that was changed or removed.
    pub fn is_repair(self) -> bool {
        !matches!(
            self,
            AdvisoryKind::FieldSynthesized | AdvisoryKind::LabelsDefaulted
        )
    }
}

/// Non-fatal notice raised by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub rows: usize,
    pub message: String,
}

impl Advisory {
    pub fn new(kind: AdvisoryKind, rows: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            rows,
            message: message.into(),
        }
    }

    pub fn log(&self) {
        if self.kind.is_repair() {
            warn!("{self}");
        } else {
            info!("{self}");
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A stage's output table together with what the stage had to say about it.
#[derive(Debug, Clone)]
pub struct Staged<T> {
    pub table: T,
    pub advisories: Vec<Advisory>,
}

impl<T> Staged<T> {
    pub fn new(table: T, advisories: Vec<Advisory>) -> Self {
        Self { table, advisories }
    }

    /// Moves the advisories into `sink`, returning the table.
    fn drain_into(self, sink: &mut Vec<Advisory>) -> T {
        for advisory in &self.advisories {
            advisory.log();
        }
        sink.extend(self.advisories);
        self.table
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub synonyms: SynonymTable,
    pub default_account_id: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            synonyms: SynonymTable::builtin(),
            default_account_id: DEFAULT_ACCOUNT_ID.to_string(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            synonyms: SynonymTable::builtin().with_overrides(config.synonyms.iter().cloned()),
            default_account_id: config.default_account_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: CanonicalTable,
    pub advisories: Vec<Advisory>,
}

impl PipelineOutput {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn advisories_of(&self, kind: AdvisoryKind) -> impl Iterator<Item = &Advisory> {
        self.advisories.iter().filter(move |a| a.kind == kind)
    }
}

/// Runs every stage over `raw` and returns the sorted canonical table.
///
/// An input whose rows are all dropped still succeeds: the table is empty and
/// an [`AdvisoryKind::EmptyResult`] advisory says so.
pub fn run(raw: RawTable, options: &PipelineOptions) -> Result<PipelineOutput, PipelineError> {
    let input_rows = raw.len();
    let mut advisories = Vec::new();

    let frame = Frame::from_raw(raw);
    let frame = options.synonyms.normalize(frame).drain_into(&mut advisories);
    let frame = coerce::coerce(frame).drain_into(&mut advisories);
    let frame = missing::handle_missing(frame).drain_into(&mut advisories);
    let frame = dedup::deduplicate(frame).drain_into(&mut advisories);
    let frame = repair::repair(frame).drain_into(&mut advisories);
    let table = synthesize::synthesize(frame, &options.default_account_id)?
        .drain_into(&mut advisories);

    if table.is_empty() {
        let advisory = Advisory::new(
            AdvisoryKind::EmptyResult,
            input_rows,
            format!("No records survived processing ({input_rows} input row(s))"),
        );
        advisory.log();
        advisories.push(advisory);
    } else {
        info!(
            "Data processing complete: {} record(s) ready for analysis",
            table.len()
        );
    }
    Ok(PipelineOutput { table, advisories })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Frame with the given columns, every cell parsed from text.
    pub fn frame(columns: &[&str], rows: &[&[&str]]) -> Frame {
        Frame::from_raw(RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        ))
    }

    pub fn numbers(frame: &Frame, column: &str) -> Vec<f64> {
        let idx = frame.column_index(column).expect("column");
        frame
            .rows()
            .iter()
            .map(|row| row.cells[idx].as_number().expect("numeric cell"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::frame;

    #[test]
    fn push_column_sees_existing_columns() {
        let mut f = frame(&["a"], &[&["x"], &["y"]]);
        f.push_column("b", |row, columns| {
            assert_eq!(columns, ["a"]);
            Cell::Text(format!("{}!", row.cells[0]))
        });
        assert_eq!(f.columns(), ["a", "b"]);
        assert_eq!(f.cell(1, "b"), Some(&Cell::Text("y!".into())));
    }

    #[test]
    fn from_raw_records_input_ordinals() {
        let f = frame(&["a"], &[&["1"], &[""], &["3"]]);
        let ordinals = f.rows().iter().map(|r| r.ordinal).collect::<Vec<_>>();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(f.rows()[1].cells[0].is_null());
    }

    #[test]
    fn run_flags_an_empty_result_separately_from_failure() {
        let raw = RawTable::new(
            ["campaign_id", "date", "spend", "impressions", "clicks"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![vec![
                "c1".into(),
                "not a date".into(),
                "1".into(),
                "10".into(),
                "1".into(),
            ]],
        );
        let output = run(raw, &PipelineOptions::default()).expect("pipeline runs");
        assert!(output.is_empty());
        assert_eq!(output.advisories_of(AdvisoryKind::EmptyResult).count(), 1);
    }

    #[test]
    fn run_fails_without_spend() {
        let raw = RawTable::new(
            vec!["campaign_id".into(), "date".into()],
            vec![vec!["c1".into(), "2024-01-01".into()]],
        );
        let err = run(raw, &PipelineOptions::default()).unwrap_err();
        assert_eq!(err, PipelineError::MissingColumn("spend"));
    }
}
