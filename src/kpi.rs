//! Derived performance indicators.
//!
//! Every ratio goes through [`ratio`], which yields 0 instead of dividing by
//! a non-positive denominator. Aggregates sum the base metrics first and run
//! the same computation on the sums, so a campaign's `ctr` is
//! `sum(clicks) / sum(impressions)`, never an average of row ratios.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    data::Cell,
    record::{CANONICAL_COLUMNS, CampaignRecord, CanonicalTable},
};

pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Inputs of the KPI computation. `purchases` and `revenue` are optional so
/// that the KPIs depending on them can be omitted when they were never
/// measured.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BaseMetrics {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub purchases: Option<u64>,
    pub revenue: Option<f64>,
}

impl BaseMetrics {
    pub fn from_record(record: &CampaignRecord) -> Self {
        Self {
            spend: record.spend,
            impressions: record.impressions,
            clicks: record.clicks,
            purchases: Some(record.purchases),
            revenue: Some(record.revenue),
        }
    }

    /// Adds `other` into `self`. An optional metric stays present if either
    /// side carries it.
    pub fn accumulate(&mut self, other: &BaseMetrics) {
        self.spend += other.spend;
        self.impressions = self.impressions.saturating_add(other.impressions);
        self.clicks = self.clicks.saturating_add(other.clicks);
        self.purchases = match (self.purchases, other.purchases) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
        };
        self.revenue = match (self.revenue, other.revenue) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
    }

    pub fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Number(self.spend),
            Cell::count(self.impressions),
            Cell::count(self.clicks),
            self.purchases
                .map(Cell::count)
                .unwrap_or(Cell::Null),
            self.revenue.map(Cell::Number).unwrap_or(Cell::Null),
        ]
    }
}

pub const METRIC_COLUMNS: &[&str] = &["spend", "impressions", "clicks", "purchases", "revenue"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpis {
    pub cpc: f64,
    pub cpm: f64,
    pub ctr: f64,
    pub cpa: Option<f64>,
    pub roas: Option<f64>,
    pub cvr: Option<f64>,
    pub frequency: f64,
    pub cost_per_impression: f64,
    pub revenue_per_impression: Option<f64>,
    pub revenue_per_click: Option<f64>,
    pub purchase_rate: Option<f64>,
    pub aov: Option<f64>,
}

impl Kpis {
    pub const COLUMNS: &'static [&'static str] = &[
        "cpc",
        "cpm",
        "ctr",
        "cpa",
        "roas",
        "cvr",
        "frequency",
        "cost_per_impression",
        "revenue_per_impression",
        "revenue_per_click",
        "purchase_rate",
        "aov",
    ];

    pub fn compute(base: &BaseMetrics) -> Self {
        let spend = base.spend;
        let impressions = base.impressions as f64;
        let clicks = base.clicks as f64;
        let purchases = base.purchases.map(|p| p as f64);
        let revenue = base.revenue;
        Self {
            cpc: ratio(spend, clicks),
            cpm: ratio(spend, impressions) * 1000.0,
            ctr: ratio(clicks, impressions),
            cpa: purchases.map(|p| ratio(spend, p)),
            roas: revenue.map(|r| ratio(r, spend)),
            cvr: purchases.map(|p| ratio(p, clicks)),
            frequency: if clicks > 0.0 {
                impressions / clicks
            } else {
                impressions
            },
            cost_per_impression: ratio(spend, impressions),
            revenue_per_impression: revenue.map(|r| ratio(r, impressions)),
            revenue_per_click: revenue.map(|r| ratio(r, clicks)),
            purchase_rate: purchases.map(|p| ratio(p, impressions)),
            aov: revenue.zip(purchases).map(|(r, p)| ratio(r, p)),
        }
    }

    /// Values in [`Kpis::COLUMNS`] order.
    pub fn values(&self) -> [Option<f64>; 12] {
        [
            Some(self.cpc),
            Some(self.cpm),
            Some(self.ctr),
            self.cpa,
            self.roas,
            self.cvr,
            Some(self.frequency),
            Some(self.cost_per_impression),
            self.revenue_per_impression,
            self.revenue_per_click,
            self.purchase_rate,
            self.aov,
        ]
    }

    pub fn cells(&self) -> Vec<Cell> {
        self.values()
            .into_iter()
            .map(|value| value.map(Cell::Number).unwrap_or(Cell::Null))
            .collect()
    }
}

/// Column-named rows of cells, the shape every output surface consumes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tabular {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Tabular {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn truncated(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.rows.truncate(limit);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub record: CampaignRecord,
    pub kpis: Kpis,
}

/// Row-level enriched table: each canonical record with its KPIs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KpiTable {
    pub rows: Vec<KpiRow>,
    pub extra_columns: Vec<String>,
}

impl KpiTable {
    pub fn from_canonical(table: CanonicalTable) -> Self {
        let rows = table
            .records
            .into_iter()
            .map(|record| {
                let kpis = Kpis::compute(&BaseMetrics::from_record(&record));
                KpiRow { record, kpis }
            })
            .collect();
        Self {
            rows,
            extra_columns: table.extra_columns,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Canonical columns, pass-through columns, then KPI columns. A KPI
    /// replaces a pass-through column of the same name.
    pub fn to_tabular(&self) -> Tabular {
        let kept_extras = self
            .extra_columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !Kpis::COLUMNS.contains(&name.as_str()))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        let headers = CANONICAL_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(kept_extras.iter().map(|&idx| self.extra_columns[idx].clone()))
            .chain(Kpis::COLUMNS.iter().map(|c| c.to_string()))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = CanonicalTable::canonical_cells(&row.record);
                cells.extend(kept_extras.iter().map(|&idx| {
                    row.record.extras.get(idx).cloned().unwrap_or_default()
                }));
                cells.extend(row.kpis.cells());
                cells
            })
            .collect();
        Tabular { headers, rows }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignAggregate {
    pub campaign_id: String,
    pub campaign_name: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub rows: usize,
    pub totals: BaseMetrics,
    pub kpis: Kpis,
}

/// One aggregate per `campaign_id`, ordered by id.
pub fn campaign_summary(table: &KpiTable) -> Vec<CampaignAggregate> {
    let mut groups: BTreeMap<&str, CampaignAggregate> = BTreeMap::new();
    for row in &table.rows {
        let record = &row.record;
        let base = BaseMetrics::from_record(record);
        groups
            .entry(record.campaign_id.as_str())
            .and_modify(|agg| {
                agg.totals.accumulate(&base);
                agg.first_date = agg.first_date.min(record.date);
                agg.last_date = agg.last_date.max(record.date);
                agg.rows += 1;
            })
            .or_insert_with(|| CampaignAggregate {
                campaign_id: record.campaign_id.clone(),
                campaign_name: record.campaign_name.clone(),
                first_date: record.date,
                last_date: record.date,
                rows: 1,
                totals: base,
                kpis: row.kpis,
            });
    }
    groups
        .into_values()
        .map(|mut agg| {
            agg.kpis = Kpis::compute(&agg.totals);
            agg
        })
        .collect()
}

pub fn campaign_tabular(aggregates: &[CampaignAggregate]) -> Tabular {
    let headers = ["campaign_id", "campaign_name", "first_date", "last_date", "rows"]
        .iter()
        .chain(METRIC_COLUMNS)
        .chain(Kpis::COLUMNS)
        .map(|c| c.to_string())
        .collect();
    let rows = aggregates
        .iter()
        .map(|agg| {
            let mut cells = vec![
                Cell::Text(agg.campaign_id.clone()),
                Cell::Text(agg.campaign_name.clone()),
                Cell::Date(agg.first_date),
                Cell::Date(agg.last_date),
                Cell::count(agg.rows as u64),
            ];
            cells.extend(agg.totals.cells());
            cells.extend(agg.kpis.cells());
            cells
        })
        .collect();
    Tabular { headers, rows }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateAggregate {
    pub date: NaiveDate,
    pub active_campaigns: usize,
    pub totals: BaseMetrics,
    pub kpis: Kpis,
}

/// One aggregate per calendar date, in date order.
pub fn date_summary(table: &KpiTable) -> Vec<DateAggregate> {
    let mut groups: BTreeMap<NaiveDate, (BaseMetrics, BTreeSet<&str>)> = BTreeMap::new();
    for row in &table.rows {
        let base = BaseMetrics::from_record(&row.record);
        let (totals, campaigns) = groups
            .entry(row.record.date)
            .or_insert_with(|| (BaseMetrics::default(), BTreeSet::new()));
        totals.accumulate(&base);
        campaigns.insert(row.record.campaign_id.as_str());
    }
    groups
        .into_iter()
        .map(|(date, (totals, campaigns))| DateAggregate {
            date,
            active_campaigns: campaigns.len(),
            kpis: Kpis::compute(&totals),
            totals,
        })
        .collect()
}

pub fn date_tabular(aggregates: &[DateAggregate]) -> Tabular {
    let headers = ["date", "active_campaigns"]
        .iter()
        .chain(METRIC_COLUMNS)
        .chain(Kpis::COLUMNS)
        .map(|c| c.to_string())
        .collect();
    let rows = aggregates
        .iter()
        .map(|agg| {
            let mut cells = vec![
                Cell::Date(agg.date),
                Cell::count(agg.active_campaigns as u64),
            ];
            cells.extend(agg.totals.cells());
            cells.extend(agg.kpis.cells());
            cells
        })
        .collect();
    Tabular { headers, rows }
}
