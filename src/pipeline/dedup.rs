use std::collections::HashSet;

use crate::pipeline::{
    ACCOUNT_ID, AD_ID, Advisory, AdvisoryKind, CAMPAIGN_ID, CAMPAIGN_NAME, DATE, Frame, Staged,
};

/// Columns forming the natural key of a row, as far as this frame has them.
///
/// `campaign_name` stands in for a `campaign_id` that will only be
/// synthesized later, since synthesized ids are unique per row and could
/// never collide.
pub fn key_columns(frame: &Frame) -> Vec<usize> {
    let campaign = if frame.has_column(CAMPAIGN_ID) {
        CAMPAIGN_ID
    } else {
        CAMPAIGN_NAME
    };
    [ACCOUNT_ID, campaign, DATE, AD_ID]
        .iter()
        .filter_map(|column| frame.column_index(column))
        .collect()
}

/// Keeps the first row for each natural key, in current row order.
pub fn deduplicate(mut frame: Frame) -> Staged<Frame> {
    let key = key_columns(&frame);
    let mut seen = HashSet::new();
    let before = frame.len();
    frame.retain_rows(|row| {
        let values = key
            .iter()
            .map(|&idx| row.cells[idx].as_display())
            .collect::<Vec<_>>();
        seen.insert(values)
    });
    let removed = before - frame.len();
    let advisories = if removed > 0 {
        vec![Advisory::new(
            AdvisoryKind::DuplicatesRemoved,
            removed,
            format!("Removed {removed} duplicate row(s)"),
        )]
    } else {
        Vec::new()
    };
    Staged::new(frame, advisories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{coerce::coerce, test_support::frame};

    #[test]
    fn keeps_first_occurrence_of_each_key() {
        let input = coerce(frame(
            &["account_id", "campaign_id", "date", "spend"],
            &[
                &["a", "c1", "2024-01-01", "10"],
                &["a", "c1", "2024-01-01", "99"],
                &["a", "c1", "2024-01-02", "5"],
            ],
        ))
        .table;
        let staged = deduplicate(input);
        assert_eq!(staged.table.len(), 2);
        assert_eq!(staged.table.rows()[0].ordinal, 0);
        assert_eq!(
            staged.table.cell(0, "spend").and_then(|c| c.as_number()),
            Some(10.0)
        );
        assert_eq!(staged.advisories[0].rows, 1);
    }

    #[test]
    fn ad_id_distinguishes_rows_when_present() {
        let input = frame(
            &["campaign_id", "date", "ad_id"],
            &[&["c1", "2024-01-01", "x"], &["c1", "2024-01-01", "y"]],
        );
        assert_eq!(deduplicate(input).table.len(), 2);
    }

    #[test]
    fn campaign_name_stands_in_for_missing_id() {
        let input = frame(
            &["campaign_name", "date"],
            &[&["Spring", "2024-01-01"], &["Spring", "2024-01-01"]],
        );
        let f = frame(&["campaign_name", "date"], &[]);
        assert_eq!(key_columns(&f), vec![0, 1]);
        assert_eq!(deduplicate(input).table.len(), 1);
    }
}
