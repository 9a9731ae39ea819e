//! Scripted report used when no language model answers.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::{
    kpi::{KpiTable, ratio},
    record::saturating_total,
};

const TOP_CAMPAIGNS: usize = 5;
const LOW_CTR: f64 = 0.01;
const HIGH_CPC: f64 = 50.0;
const LOW_CVR: f64 = 0.01;

pub fn report(table: &KpiTable, currency: &str) -> String {
    let records = table.rows.iter().map(|row| &row.record).collect::<Vec<_>>();
    let kpis = table.rows.iter().map(|row| &row.kpis).collect::<Vec<_>>();
    let money = |value: f64| format!("{currency}{}", group_thousands(value, 2));

    let total_spend = records.iter().map(|r| r.spend).sum::<f64>();
    let total_impressions = saturating_total(records.iter().map(|r| r.impressions));
    let total_clicks = saturating_total(records.iter().map(|r| r.clicks));
    let total_purchases = saturating_total(records.iter().map(|r| r.purchases));
    let campaigns = records
        .iter()
        .map(|r| r.campaign_name.as_str())
        .collect::<HashSet<_>>()
        .len();
    let date_range = records
        .iter()
        .map(|r| r.date)
        .minmax()
        .into_option()
        .map(|(first, last)| format!("{first} to {last}"))
        .unwrap_or_else(|| "n/a".to_string());

    let avg_ctr = mean(kpis.iter().map(|k| k.ctr));
    let avg_cpc = mean(kpis.iter().map(|k| k.cpc));
    let avg_cpm = mean(kpis.iter().map(|k| k.cpm));
    let avg_cvr = mean(kpis.iter().filter_map(|k| k.cvr));
    let avg_cpa = mean(kpis.iter().filter_map(|k| k.cpa));
    let overall_ctr = ratio(total_clicks as f64, total_impressions as f64);

    let mut lines = vec![
        "# Campaign Performance Analysis (Basic Insights)".to_string(),
        String::new(),
        "## Campaign Overview".to_string(),
        format!("- **Total Campaigns:** {campaigns}"),
        format!("- **Total Records:** {}", records.len()),
        format!("- **Date Range:** {date_range}"),
        format!("- **Total Spend:** {}", money(total_spend)),
        format!(
            "- **Total Impressions:** {}",
            group_thousands(total_impressions as f64, 0)
        ),
        format!("- **Total Clicks:** {}", group_thousands(total_clicks as f64, 0)),
        format!(
            "- **Total Conversions:** {}",
            group_thousands(total_purchases as f64, 0)
        ),
        String::new(),
        "## Key Performance Metrics".to_string(),
        format!("- **Average CTR (Click-Through Rate):** {}", percent(avg_ctr)),
        format!("- **Overall CTR (all clicks / all impressions):** {}", percent(overall_ctr)),
        format!("- **Average CPC (Cost Per Click):** {currency}{avg_cpc:.2}"),
        format!("- **Average CPM (Cost Per 1000 Impressions):** {currency}{avg_cpm:.2}"),
        format!("- **Average CVR (Conversion Rate):** {}", percent(avg_cvr)),
        format!("- **Average CPA (Cost Per Acquisition):** {currency}{avg_cpa:.2}"),
        String::new(),
        "## Top Performing Campaigns by Spend".to_string(),
    ];

    let mut spend_by_campaign: BTreeMap<&str, f64> = BTreeMap::new();
    for record in &records {
        *spend_by_campaign.entry(&record.campaign_name).or_default() += record.spend;
    }
    // BTreeMap iteration is name-ordered, so the stable sort breaks ties by name.
    let top = spend_by_campaign
        .into_iter()
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .take(TOP_CAMPAIGNS);
    for (rank, (name, spend)) in top.enumerate() {
        lines.push(format!("{}. **{name}**: {}", rank + 1, money(spend)));
    }
    lines.push(String::new());

    lines.push("## Basic Recommendations".to_string());
    if avg_ctr < LOW_CTR {
        lines.push(
            "- **Improve Ad Creative**: CTR is below 1%, consider testing new visuals and copy"
                .to_string(),
        );
    }
    if avg_cpc > HIGH_CPC {
        lines.push(
            "- **Optimize Targeting**: High CPC suggests need for better audience targeting"
                .to_string(),
        );
    }
    if total_purchases == 0 {
        lines.push(
            "- **Conversion Tracking**: No conversions detected, verify tracking setup".to_string(),
        );
    } else if avg_cvr < LOW_CVR {
        lines.push(
            "- **Landing Page Optimization**: Low conversion rate suggests landing page improvements needed"
                .to_string(),
        );
    }
    lines.extend(
        [
            "- **Budget Optimization**: Focus budget on top-performing campaigns",
            "- **A/B Testing**: Implement systematic testing of ad variations",
            "- **Performance Monitoring**: Set up regular performance review cycles",
        ]
        .map(String::from),
    );

    lines.join("\n")
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    ratio(sum, count as f64)
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Formats `value` with `decimals` fraction digits and comma-grouped thousands.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (formatted.as_str(), None),
    };
    let grouped = whole
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk))
        .join(",");
    let sign = if value < 0.0 && formatted.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}
