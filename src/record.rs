use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::Cell;

/// One row of the canonical campaign table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignRecord {
    pub account_id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub purchases: u64,
    pub revenue: f64,
    pub ad_id: Option<String>,
    pub ad_name: String,
    pub objective: Option<String>,
    pub creative_id: Option<String>,
    /// Values of the table's pass-through columns, aligned with
    /// [`CanonicalTable::extra_columns`].
    #[serde(skip)]
    pub extras: Vec<Cell>,
}

impl CampaignRecord {
    /// Natural key: `(account_id, campaign_id, date, ad_id)`.
    pub fn key(&self) -> (&str, &str, NaiveDate, Option<&str>) {
        (
            &self.account_id,
            &self.campaign_id,
            self.date,
            self.ad_id.as_deref(),
        )
    }
}

pub const CANONICAL_COLUMNS: &[&str] = &[
    "account_id",
    "campaign_id",
    "campaign_name",
    "date",
    "spend",
    "impressions",
    "clicks",
    "purchases",
    "revenue",
    "ad_id",
    "ad_name",
    "objective",
    "creative_id",
];

/// Output of the normalization pipeline, sorted by `(date, campaign_name)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalTable {
    pub records: Vec<CampaignRecord>,
    /// Source columns with no canonical counterpart, in source order.
    pub extra_columns: Vec<String>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn extra<'a>(&self, record: &'a CampaignRecord, column: &str) -> Option<&'a Cell> {
        let idx = self.extra_columns.iter().position(|c| c == column)?;
        record.extras.get(idx)
    }

    /// Canonical values of a record as cells, in [`CANONICAL_COLUMNS`] order.
    pub fn canonical_cells(record: &CampaignRecord) -> Vec<Cell> {
        let optional = |value: &Option<String>| {
            value
                .as_ref()
                .map(|v| Cell::Text(v.clone()))
                .unwrap_or(Cell::Null)
        };
        vec![
            Cell::Text(record.account_id.clone()),
            Cell::Text(record.campaign_id.clone()),
            Cell::Text(record.campaign_name.clone()),
            Cell::Date(record.date),
            Cell::Number(record.spend),
            Cell::count(record.impressions),
            Cell::count(record.clicks),
            Cell::count(record.purchases),
            Cell::Number(record.revenue),
            optional(&record.ad_id),
            Cell::Text(record.ad_name.clone()),
            optional(&record.objective),
            optional(&record.creative_id),
        ]
    }

    pub fn summary(&self) -> DataSummary {
        let dates = self.records.iter().map(|r| r.date);
        let date_range = dates
            .clone()
            .min()
            .zip(dates.max());
        DataSummary {
            total_rows: self.records.len(),
            date_range,
            campaigns: self
                .records
                .iter()
                .map(|r| r.campaign_id.as_str())
                .collect::<HashSet<_>>()
                .len(),
            accounts: self
                .records
                .iter()
                .map(|r| r.account_id.as_str())
                .collect::<HashSet<_>>()
                .len(),
            total_spend: self.records.iter().map(|r| r.spend).sum(),
            total_impressions: saturating_total(self.records.iter().map(|r| r.impressions)),
            total_clicks: saturating_total(self.records.iter().map(|r| r.clicks)),
            total_purchases: saturating_total(self.records.iter().map(|r| r.purchases)),
            total_revenue: self.records.iter().map(|r| r.revenue).sum(),
        }
    }
}

/// Sum of counts that saturates at `u64::MAX` instead of overflowing.
pub fn saturating_total<I>(values: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    values.into_iter().fold(0, u64::saturating_add)
}

/// Headline figures of a canonical table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_rows: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub campaigns: usize,
    pub accounts: usize,
    pub total_spend: f64,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_purchases: u64,
    pub total_revenue: f64,
}
