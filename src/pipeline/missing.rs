use crate::{
    data::Cell,
    pipeline::{
        ACCOUNT_ID, AD_NAME, Advisory, AdvisoryKind, CAMPAIGN_ID, CAMPAIGN_NAME, CLICKS, DATE,
        Frame, IMPRESSIONS, OBJECTIVE, PURCHASES, REVENUE, SPEND, Staged, UNKNOWN_LABEL,
    },
};

const ZERO_FILLED: &[&str] = &[SPEND, IMPRESSIONS, CLICKS, PURCHASES, REVENUE];

/// Rows lacking any of these (when the column exists) are dropped.
const REQUIRED_KEYS: &[&str] = &[ACCOUNT_ID, CAMPAIGN_ID, DATE];

const LABEL_COLUMNS: &[&str] = &[AD_NAME, CAMPAIGN_NAME, OBJECTIVE];

pub fn handle_missing(mut frame: Frame) -> Staged<Frame> {
    let mut advisories = Vec::new();

    let mut filled = 0usize;
    let metric_indices = indices(&frame, ZERO_FILLED);
    for row in frame.rows_mut() {
        for &idx in &metric_indices {
            if row.cells[idx].is_null() {
                row.cells[idx] = Cell::Number(0.0);
                filled += 1;
            }
        }
    }
    if filled > 0 {
        advisories.push(Advisory::new(
            AdvisoryKind::MetricsZeroFilled,
            filled,
            format!("Filled {filled} missing metric value(s) with 0"),
        ));
    }

    let key_indices = indices(&frame, REQUIRED_KEYS);
    let before = frame.len();
    frame.retain_rows(|row| key_indices.iter().all(|&idx| !row.cells[idx].is_null()));
    let dropped = before - frame.len();
    if dropped > 0 {
        advisories.push(Advisory::new(
            AdvisoryKind::RowsDropped,
            dropped,
            format!("Dropped {dropped} row(s) missing an account, campaign or date"),
        ));
    }

    let label_indices = indices(&frame, LABEL_COLUMNS);
    let mut defaulted = 0usize;
    for row in frame.rows_mut() {
        for &idx in &label_indices {
            if row.cells[idx].is_null() {
                row.cells[idx] = Cell::Text(UNKNOWN_LABEL.to_string());
                defaulted += 1;
            }
        }
    }
    if defaulted > 0 {
        advisories.push(Advisory::new(
            AdvisoryKind::LabelsDefaulted,
            defaulted,
            format!("Labelled {defaulted} missing name/objective value(s) as '{UNKNOWN_LABEL}'"),
        ));
    }

    Staged::new(frame, advisories)
}

fn indices(frame: &Frame, columns: &[&str]) -> Vec<usize> {
    columns
        .iter()
        .filter_map(|column| frame.column_index(column))
        .collect()
}
