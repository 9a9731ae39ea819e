//! Narrative analysis of an enriched table.
//!
//! The table is sent to a chat-completion model as a JSON array of flat row
//! records. Any failure on that path (no API key, network trouble, an error
//! status or an empty answer) degrades to the deterministic report in
//! [`fallback`]; insight generation never fails a run.

pub mod fallback;
pub mod llm;

use std::fmt;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{export::json_records, kpi::KpiTable};

pub const SYSTEM_MESSAGE: &str = "You are a digital marketing analyst who specializes in \
reviewing paid-advertising campaign performance and recommending optimizations.";

pub const ANALYSIS_PROMPT: &str = "\
Below is a JSON array of advertising campaign records. Every object carries \
delivery and cost metrics (impressions, clicks, spend, purchases, revenue) and \
derived ratios such as CTR, CPC, CPM, CPA, ROAS and conversion rate.

For every campaign:
- Walk the funnel from delivery (impressions, reach) down to purchases and revenue.
- Point out where the funnel leaks, for example a weak CTR, an expensive click, \
plenty of clicks with no purchases, or thin delivery.
- Suggest likely causes such as tired creatives, a poor audience match, budget \
caps or a conversion event that is not firing.
- Recommend specific fixes.

Across campaigns:
- Name the campaign that converts best and explain why.
- Name the campaigns that spend without results.
- Propose how budget should move between campaigns.

Structure the answer per campaign with the headings Campaign Name, Funnel \
Summary, Gaps Identified, Recommendations and Overall Priority (High, Medium \
or Low). Spell out every abbreviation the first time it is used.

Campaign data:";

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("environment variable {0} holding the API key is not set")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("completion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response could not be read: {0}")]
    Malformed(String),
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

/// A chat model that turns a system and a user message into text.
pub trait LanguageModel {
    fn complete(&self, system: &str, user: &str) -> Result<String, InsightError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightSource {
    Model,
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insights {
    pub text: String,
    pub source: InsightSource,
}

impl Insights {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, InsightSource::Fallback { .. })
    }
}

impl fmt::Display for Insights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Analytical prompt followed by the pretty-printed row records.
pub fn build_prompt(table: &KpiTable) -> Result<String> {
    let payload = serde_json::to_string_pretty(&json_records(&table.to_tabular()))
        .context("Serializing insight payload")?;
    Ok(format!("{ANALYSIS_PROMPT}\n\n{payload}"))
}

/// Asks `model` for an analysis of `table`, falling back to the scripted
/// report when there is no model or it fails.
pub fn generate(model: Option<&dyn LanguageModel>, table: &KpiTable, currency: &str) -> Insights {
    let reason = match (model, build_prompt(table)) {
        (None, _) => "no language model configured".to_string(),
        (Some(_), Err(err)) => format!("{err:#}"),
        (Some(model), Ok(prompt)) => {
            debug!("Insight payload:\n{prompt}");
            info!("Requesting insights for {} record(s)", table.len());
            match model.complete(SYSTEM_MESSAGE, &prompt) {
                Ok(text) if !text.trim().is_empty() => {
                    return Insights {
                        text,
                        source: InsightSource::Model,
                    };
                }
                Ok(_) => InsightError::EmptyCompletion.to_string(),
                Err(err) => err.to_string(),
            }
        }
    };
    warn!("Using basic insights: {reason}");
    Insights {
        text: fallback::report(table, currency),
        source: InsightSource::Fallback { reason },
    }
}
