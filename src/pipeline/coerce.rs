use crate::{
    data::{Cell, parse_naive_date, parse_number},
    pipeline::{
        ACCOUNT_ID, AD_ID, Advisory, AdvisoryKind, CAMPAIGN_ID, CLICKS, CREATIVE_ID, DATE, Frame,
        IMPRESSIONS, PURCHASES, RESULTS, REVENUE, SPEND, Staged,
    },
};

pub const NUMERIC_COLUMNS: &[&str] = &[
    SPEND,
    IMPRESSIONS,
    CLICKS,
    PURCHASES,
    REVENUE,
    RESULTS,
    "reach",
    "frequency",
];

/// Counts that cannot be negative; negative inputs are clipped rather than dropped.
const CLIPPED_COLUMNS: &[&str] = &[IMPRESSIONS, CLICKS, PURCHASES];

pub const IDENTIFIER_COLUMNS: &[&str] = &[ACCOUNT_ID, CAMPAIGN_ID, AD_ID, CREATIVE_ID];

/// Converts recognised columns to typed cells. This stage cleans, it never
/// rejects: unparseable values become nulls for the next stage to handle.
pub fn coerce(mut frame: Frame) -> Staged<Frame> {
    let mut advisories = Vec::new();

    if let Some(idx) = frame.column_index(DATE) {
        let mut unparseable = 0usize;
        for row in frame.rows_mut() {
            let cell = &mut row.cells[idx];
            *cell = match std::mem::take(cell) {
                Cell::Text(text) => match parse_naive_date(&text) {
                    Ok(date) => Cell::Date(date),
                    Err(_) => {
                        unparseable += 1;
                        Cell::Null
                    }
                },
                Cell::Date(date) => Cell::Date(date),
                _ => Cell::Null,
            };
        }
        if unparseable > 0 {
            advisories.push(Advisory::new(
                AdvisoryKind::UnparseableValues,
                unparseable,
                format!("{unparseable} value(s) in 'date' could not be parsed as dates"),
            ));
        }
    }

    for &column in NUMERIC_COLUMNS {
        let Some(idx) = frame.column_index(column) else {
            continue;
        };
        let clip = CLIPPED_COLUMNS.contains(&column);
        let mut unparseable = 0usize;
        let mut clipped = 0usize;
        for row in frame.rows_mut() {
            let cell = &mut row.cells[idx];
            let parsed = match &*cell {
                Cell::Text(text) => {
                    let parsed = parse_number(text);
                    if parsed.is_none() {
                        unparseable += 1;
                    }
                    parsed
                }
                other => other.as_number(),
            };
            *cell = match parsed {
                Some(value) if clip && value < 0.0 => {
                    clipped += 1;
                    Cell::Number(0.0)
                }
                Some(value) => Cell::Number(value),
                None => Cell::Null,
            };
        }
        if unparseable > 0 {
            advisories.push(Advisory::new(
                AdvisoryKind::UnparseableValues,
                unparseable,
                format!("{unparseable} value(s) in '{column}' are not numeric"),
            ));
        }
        if clipped > 0 {
            advisories.push(Advisory::new(
                AdvisoryKind::NegativeClipped,
                clipped,
                format!("Clipped {clipped} negative value(s) in '{column}' to 0"),
            ));
        }
    }

    for &column in IDENTIFIER_COLUMNS {
        let Some(idx) = frame.column_index(column) else {
            continue;
        };
        for row in frame.rows_mut() {
            let cell = &mut row.cells[idx];
            if !cell.is_null() && cell.as_text().is_none() {
                *cell = Cell::Text(cell.as_display());
            }
        }
    }

    Staged::new(frame, advisories)
}
