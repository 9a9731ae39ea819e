use crate::{
    data::Cell,
    pipeline::{
        ACCOUNT_ID, AD_ID, AD_NAME, Advisory, AdvisoryKind, CAMPAIGN_ID, CAMPAIGN_NAME, CLICKS,
        CREATIVE_ID, DATE, Frame, FrameRow, IMPRESSIONS, OBJECTIVE, PipelineError, PURCHASES,
        RESULTS, REVENUE, SPEND, Staged, UNKNOWN_LABEL, repair, whole_count,
    },
    record::{CANONICAL_COLUMNS, CampaignRecord, CanonicalTable},
};

/// Columns that can never be synthesized.
const NON_SYNTHESIZABLE: &[&str] = &[DATE, SPEND, IMPRESSIONS, CLICKS];

/// Fills in structurally required columns the source did not carry, then
/// converts the frame into sorted canonical records.
///
/// Synthesized ids embed the row's input ordinal: stable for a given input,
/// not across reorderings of it.
pub fn synthesize(
    mut frame: Frame,
    default_account_id: &str,
) -> Result<Staged<CanonicalTable>, PipelineError> {
    for &column in NON_SYNTHESIZABLE {
        if !frame.has_column(column) {
            return Err(PipelineError::MissingColumn(column));
        }
    }
    let mut advisories = Vec::new();
    let mut note = |column: &str, how: String| {
        advisories.push(Advisory::new(
            AdvisoryKind::FieldSynthesized,
            0,
            format!("Column '{column}' absent from input; {how}"),
        ));
    };

    if !frame.has_column(ACCOUNT_ID) {
        let account = default_account_id.to_string();
        frame.push_column(ACCOUNT_ID, |_, _| Cell::Text(account.clone()));
        note(ACCOUNT_ID, format!("using '{default_account_id}'"));
    }

    if !frame.has_column(CAMPAIGN_ID) {
        let name_idx = frame
            .column_index(CAMPAIGN_NAME)
            .ok_or(PipelineError::MissingColumn(CAMPAIGN_ID))?;
        frame.push_column(CAMPAIGN_ID, |row, _| {
            Cell::Text(format!(
                "{}_{}",
                slug(&label(row, name_idx)),
                row.ordinal
            ))
        });
        note(CAMPAIGN_ID, "derived from campaign name and row position".into());
    }

    if !frame.has_column(PURCHASES) {
        match frame.column_index(RESULTS) {
            Some(results) => {
                frame.push_column(PURCHASES, |row, _| {
                    Cell::Number(Frame::number(row, results))
                });
                note(PURCHASES, format!("copied from '{RESULTS}'"));
            }
            None => {
                frame.push_column(PURCHASES, |_, _| Cell::Number(0.0));
                note(PURCHASES, "defaulted to 0".into());
            }
        }
    }

    if !frame.has_column(REVENUE) {
        frame.push_column(REVENUE, |_, _| Cell::Number(0.0));
        note(REVENUE, "defaulted to 0".into());
    }

    if !frame.has_column(AD_ID) {
        let campaign_idx = frame
            .column_index(CAMPAIGN_ID)
            .ok_or(PipelineError::MissingColumn(CAMPAIGN_ID))?;
        frame.push_column(AD_ID, |row, _| {
            Cell::Text(format!(
                "{}_ad_{}",
                row.cells[campaign_idx].as_display(),
                row.ordinal
            ))
        });
        note(AD_ID, "derived from campaign id and row position".into());
    }

    let name_idx = frame.column_index(CAMPAIGN_NAME);
    if !frame.has_column(AD_NAME) {
        frame.push_column(AD_NAME, |row, _| {
            let name = name_idx
                .map(|idx| label(row, idx))
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            Cell::Text(format!("{name} - Ad"))
        });
        note(AD_NAME, "derived from campaign name".into());
    }

    // A synthesized purchases column may sit next to real revenue.
    if let Some(advisory) = repair::infer_purchases_from_revenue(&mut frame) {
        advisories.push(advisory);
    }

    let table = into_canonical(frame);
    Ok(Staged::new(table, advisories))
}

fn into_canonical(frame: Frame) -> CanonicalTable {
    let (columns, rows) = frame.into_parts();
    let position = |name: &str| columns.iter().position(|c| c == name);
    let extra_indices = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !CANONICAL_COLUMNS.contains(&name.as_str()))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let extra_columns = extra_indices
        .iter()
        .map(|&idx| columns[idx].clone())
        .collect::<Vec<_>>();

    let account = position(ACCOUNT_ID);
    let campaign = position(CAMPAIGN_ID);
    let name = position(CAMPAIGN_NAME);
    let date = position(DATE);
    let spend = position(SPEND);
    let impressions = position(IMPRESSIONS);
    let clicks = position(CLICKS);
    let purchases = position(PURCHASES);
    let revenue = position(REVENUE);
    let ad_id = position(AD_ID);
    let ad_name = position(AD_NAME);
    let objective = position(OBJECTIVE);
    let creative = position(CREATIVE_ID);

    let mut records = rows
        .into_iter()
        .filter_map(|row| {
            let date = date.and_then(|idx| row.cells[idx].as_date())?;
            let metric = |idx: Option<usize>| idx.map(|i| Frame::number(&row, i)).unwrap_or(0.0);
            let text = |idx: Option<usize>| idx.map(|i| row.cells[i].as_display());
            let optional = |idx: Option<usize>| text(idx).filter(|v| !v.is_empty());
            Some(CampaignRecord {
                account_id: text(account).unwrap_or_default(),
                campaign_id: text(campaign).unwrap_or_default(),
                campaign_name: optional(name).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                date,
                spend: metric(spend).max(0.0),
                impressions: whole_count(metric(impressions)),
                clicks: whole_count(metric(clicks)),
                purchases: whole_count(metric(purchases)),
                revenue: metric(revenue).max(0.0),
                ad_id: optional(ad_id),
                ad_name: optional(ad_name).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                objective: optional(objective),
                creative_id: optional(creative),
                extras: extra_indices
                    .iter()
                    .map(|&idx| row.cells[idx].clone())
                    .collect(),
            })
        })
        .collect::<Vec<_>>();
    records.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.campaign_name.cmp(&b.campaign_name))
    });
    CanonicalTable {
        records,
        extra_columns,
    }
}

fn label(row: &FrameRow, idx: usize) -> String {
    match &row.cells[idx] {
        Cell::Null => UNKNOWN_LABEL.to_string(),
        other => other.as_display(),
    }
}

fn slug(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}
