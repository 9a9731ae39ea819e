//! Cross-field consistency repairs.
//!
//! Each rule rewrites the offending rows in place and reports how many it
//! touched. Rules whose columns are absent are skipped.

use crate::{
    data::Cell,
    pipeline::{
        Advisory, AdvisoryKind, CLICKS, Frame, IMPRESSIONS, PURCHASES, REVENUE, SPEND, Staged,
        whole_count,
    },
};

pub fn repair(mut frame: Frame) -> Staged<Frame> {
    let advisories = [
        cap_clicks_at_impressions(&mut frame),
        clip_negative_spend(&mut frame),
        infer_purchases_from_revenue(&mut frame),
    ]
    .into_iter()
    .flatten()
    .collect();
    Staged::new(frame, advisories)
}

/// `clicks > impressions` cannot happen; trust the impression count.
pub fn cap_clicks_at_impressions(frame: &mut Frame) -> Option<Advisory> {
    let clicks = frame.column_index(CLICKS)?;
    let impressions = frame.column_index(IMPRESSIONS)?;
    let mut affected = 0usize;
    for row in frame.rows_mut() {
        let cap = Frame::number(row, impressions);
        if Frame::number(row, clicks) > cap {
            row.cells[clicks] = Cell::Number(cap);
            affected += 1;
        }
    }
    (affected > 0).then(|| {
        Advisory::new(
            AdvisoryKind::ClicksCapped,
            affected,
            format!(
                "Found {affected} row(s) where clicks > impressions; set clicks = impressions"
            ),
        )
    })
}

pub fn clip_negative_spend(frame: &mut Frame) -> Option<Advisory> {
    let spend = frame.column_index(SPEND)?;
    let mut affected = 0usize;
    for row in frame.rows_mut() {
        if Frame::number(row, spend) < 0.0 {
            row.cells[spend] = Cell::Number(0.0);
            affected += 1;
        }
    }
    (affected > 0).then(|| {
        Advisory::new(
            AdvisoryKind::NegativeSpend,
            affected,
            format!("Found {affected} row(s) with negative spend; set to 0"),
        )
    })
}

/// Revenue is taken as proof of at least one conversion even when the
/// conversion count was not reported. The count is judged as it will be
/// stored, so fractions that round to zero and negatives are repaired too.
pub fn infer_purchases_from_revenue(frame: &mut Frame) -> Option<Advisory> {
    let purchases = frame.column_index(PURCHASES)?;
    let revenue = frame.column_index(REVENUE)?;
    let mut affected = 0usize;
    for row in frame.rows_mut() {
        if Frame::number(row, revenue) > 0.0 && whole_count(Frame::number(row, purchases)) == 0 {
            row.cells[purchases] = Cell::Number(1.0);
            affected += 1;
        }
    }
    (affected > 0).then(|| {
        Advisory::new(
            AdvisoryKind::PurchasesInferred,
            affected,
            format!("Set purchases = 1 for {affected} row(s) with revenue but no purchases"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{
        coerce::coerce,
        test_support::{frame, numbers},
    };

    #[test]
    fn caps_clicks_and_reports_each_rule() {
        let input = coerce(frame(
            &["spend", "impressions", "clicks", "purchases", "revenue"],
            &[
                &["50", "100", "120", "0", "0"],
                &["-3", "10", "2", "0", "500"],
                &["1", "10", "2", "4", "40"],
            ],
        ))
        .table;
        let staged = repair(input);
        assert_eq!(numbers(&staged.table, "clicks"), vec![100.0, 2.0, 2.0]);
        assert_eq!(numbers(&staged.table, "spend"), vec![50.0, 0.0, 1.0]);
        assert_eq!(numbers(&staged.table, "purchases"), vec![0.0, 1.0, 4.0]);
        let kinds = staged.advisories.iter().map(|a| a.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                AdvisoryKind::ClicksCapped,
                AdvisoryKind::NegativeSpend,
                AdvisoryKind::PurchasesInferred
            ]
        );
        assert!(staged.advisories.iter().all(|a| a.rows == 1));
    }

    #[test]
    fn consistent_tables_raise_nothing() {
        let input = coerce(frame(
            &["spend", "impressions", "clicks"],
            &[&["5", "100", "10"]],
        ))
        .table;
        let staged = repair(input.clone());
        assert_eq!(staged.table, input);
        assert!(staged.advisories.is_empty());
    }

    #[test]
    fn purchases_that_round_to_zero_are_inferred() {
        let mut input = frame(
            &["purchases", "revenue"],
            &[&["0.4", "250"], &["-2", "250"], &["0.6", "250"], &["0.4", "0"]],
        );
        for row in input.rows_mut() {
            for cell in &mut row.cells {
                *cell = Cell::Number(cell.as_display().parse().unwrap());
            }
        }
        let advisory = infer_purchases_from_revenue(&mut input).unwrap();
        assert_eq!(advisory.rows, 2);
        assert_eq!(numbers(&input, "purchases"), vec![1.0, 1.0, 0.6, 0.4]);
    }

    #[test]
    fn purchase_rule_needs_both_columns() {
        let mut input = coerce(frame(&["revenue"], &[&["20"]])).table;
        assert!(infer_purchases_from_revenue(&mut input).is_none());
    }
}
