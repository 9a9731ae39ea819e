//! Column-name reconciliation.
//!
//! Headers are lower-cased and trimmed, then looked up in an ordered
//! [`SynonymTable`]; the first rule whose pattern matches renames the column.
//! Columns no rule matches keep their normalized name.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    data::normalize_header,
    pipeline::{Advisory, AdvisoryKind, Frame, Staged},
};

/// Maps one (normalized) source header to a canonical column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymRule {
    pub pattern: String,
    pub canonical: String,
}

impl SynonymRule {
    pub fn new(pattern: &str, canonical: &str) -> Self {
        Self {
            pattern: normalize_header(pattern),
            canonical: canonical.to_string(),
        }
    }
}

/// Platform export headers (spend reported in INR) and reporting-API field
/// names, paired with the canonical columns they carry.
const BUILTIN_SYNONYMS: &[(&str, &str)] = &[
    ("campaign name", "campaign_name"),
    ("reporting starts", "date"),
    ("date_start", "date"),
    ("amount spent (inr)", "spend"),
    ("impressions", "impressions"),
    ("link clicks", "clicks"),
    ("results", "purchases"),
    ("reach", "reach"),
    ("frequency", "frequency"),
    ("cpm (cost per 1,000 impressions) (inr)", "cpm_original"),
    ("cpc (cost per link click) (inr)", "cpc_original"),
    ("ctr (link click-through rate)", "ctr_original"),
    ("clicks (all)", "clicks_all"),
    ("ctr (all)", "ctr_all"),
    ("cpc (all) (inr)", "cpc_all"),
    ("shop_clicks", "shop_clicks"),
    ("cost per results", "cost_per_results"),
    ("result indicator", "result_indicator"),
    ("campaign delivery", "campaign_delivery"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    rules: Vec<SynonymRule>,
}

impl SynonymTable {
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_SYNONYMS
                .iter()
                .map(|(pattern, canonical)| SynonymRule::new(pattern, canonical))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Places `rules` ahead of the existing ones so they win on conflict.
    pub fn with_overrides<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = SynonymRule>,
    {
        let mut merged = rules
            .into_iter()
            .map(|rule| SynonymRule::new(&rule.pattern, &rule.canonical))
            .collect::<Vec<_>>();
        merged.append(&mut self.rules);
        self.rules = merged;
        self
    }

    pub fn rules(&self) -> &[SynonymRule] {
        &self.rules
    }

    /// Canonical name for a raw header.
    pub fn resolve(&self, header: &str) -> String {
        let normalized = normalize_header(header);
        self.rules
            .iter()
            .find(|rule| rule.pattern == normalized)
            .map(|rule| rule.canonical.clone())
            .unwrap_or(normalized)
    }

    /// Renames every column of `frame`. When two columns resolve to the same
    /// name, the first one keeps it and the later ones keep their normalized
    /// source name, suffixed with `_2`, `_3`, ... if that name is taken too.
    pub fn normalize(&self, mut frame: Frame) -> Staged<Frame> {
        let mut advisories = Vec::new();
        let mut taken = HashSet::new();
        let mut renamed = Vec::with_capacity(frame.columns().len());
        for header in frame.columns() {
            let canonical = self.resolve(header);
            if taken.insert(canonical.clone()) {
                renamed.push(canonical);
                continue;
            }
            let fallback = unclaimed(&taken, normalize_header(header));
            advisories.push(Advisory::new(
                AdvisoryKind::ConflictingColumn,
                0,
                format!(
                    "Column '{header}' also maps to '{canonical}'; kept as '{fallback}'"
                ),
            ));
            taken.insert(fallback.clone());
            renamed.push(fallback);
        }
        frame.rename_columns(renamed);
        Staged::new(frame, advisories)
    }
}

fn unclaimed(taken: &HashSet<String>, name: String) -> String {
    if !taken.contains(&name) {
        return name;
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{name}_{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::builtin()
    }
}
