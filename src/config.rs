//! Run configuration loaded from an optional YAML file.
//!
//! Every field has a default so an empty file (or no file at all) is a valid
//! configuration. Secrets are never read from this file; it only names the
//! environment variables that hold them.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::normalize::SynonymRule;

pub const DEFAULT_ACCOUNT_ID: &str = "account_001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Account id assigned when the input carries no `account_id` column.
    pub default_account_id: String,
    /// Symbol used when formatting money in the fallback report.
    pub currency_symbol: String,
    /// Extra column synonyms, consulted before the built-in table.
    pub synonyms: Vec<SynonymRule>,
    pub validation: ValidationConfig,
    pub remote: RemoteConfig,
    pub insights: InsightsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_account_id: DEFAULT_ACCOUNT_ID.to_string(),
            currency_symbol: "₹".to_string(),
            synonyms: Vec::new(),
            validation: ValidationConfig::default(),
            remote: RemoteConfig::default(),
            insights: InsightsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut raw = String::new();
        BufReader::new(
            File::open(path).with_context(|| format!("Opening config file {path:?}"))?,
        )
        .read_to_string(&mut raw)
        .with_context(|| format!("Reading config file {path:?}"))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).context("Parsing config YAML")
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Columns missing more than this share of values raise a warning.
    pub missing_ratio_warning: f64,
    /// Per-row cost per click above this is flagged as implausible.
    pub max_plausible_cpc: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            missing_ratio_warning: 0.10,
            max_plausible_cpc: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Action type whose count and value become purchases and revenue.
    pub action_type: String,
    pub required_scopes: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com/v18.0".to_string(),
            action_type: "purchase".to_string(),
            required_scopes: vec!["ads_read".to_string(), "read_insights".to_string()],
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightsConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let yaml = r#"
default_account_id: acme_main
synonyms:
  - pattern: "Spend (USD)"
    canonical: spend
validation:
  max_plausible_cpc: 25
"#;
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write yaml");
        let config = AppConfig::load(file.path()).expect("load config");
        assert_eq!(config.default_account_id, "acme_main");
        assert_eq!(config.synonyms.len(), 1);
        assert_eq!(config.validation.max_plausible_cpc, 25.0);
        assert_eq!(config.validation.missing_ratio_warning, 0.10);
        assert_eq!(config.remote, RemoteConfig::default());
        assert_eq!(config.currency_symbol, "₹");
    }

    #[test]
    fn empty_file_yields_default_config() {
        let file = NamedTempFile::new().expect("temp file");
        let config = AppConfig::load(file.path()).expect("load empty config");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"default_acount_id: typo\n").expect("write yaml");
        assert!(AppConfig::load(file.path()).is_err());
    }
}
