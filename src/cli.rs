use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Normalize ad-campaign data and derive performance KPIs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check an uploaded campaign file for structural and data problems
    Validate(ValidateArgs),
    /// Normalize a campaign file, compute KPIs and export the result
    Process(ProcessArgs),
    /// Pull insights for one or more ad accounts and process them
    Fetch(FetchArgs),
    /// Verify the access token and list the ad accounts it can read
    Accounts(AccountsArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file (CSV, TSV or spreadsheet; `-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format; defaults to the output file's extension, else csv
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    /// Granularity of the exported table
    #[arg(long, value_enum, default_value = "row")]
    pub level: Level,
    /// Render output as an aligned table to stdout
    #[arg(long = "table")]
    pub table: bool,
    /// Limit number of rows emitted
    #[arg(long)]
    pub limit: Option<usize>,
    /// Write a narrative analysis of the KPI table to this file
    #[arg(long = "insights")]
    pub insights: Option<PathBuf>,
    /// Never call the language model; always use the scripted analysis
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    /// Run the pipeline even if the admission check would reject the file
    #[arg(long = "skip-validation")]
    pub skip_validation: bool,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Ad account ids to read, in order (e.g. act_123)
    #[arg(long = "account", required = true, action = clap::ArgAction::Append)]
    pub accounts: Vec<String>,
    /// First day of the reporting range (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub since: NaiveDate,
    /// Last day of the reporting range (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub until: NaiveDate,
    /// Environment variable holding the access token
    #[arg(long = "token-env", default_value = "META_ACCESS_TOKEN")]
    pub token_env: String,
    #[command(flatten)]
    pub output: OutputArgs,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AccountsArgs {
    /// Environment variable holding the access token
    #[arg(long = "token-env", default_value = "META_ACCESS_TOKEN")]
    pub token_env: String,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
    Xlsx,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum Level {
    #[default]
    Row,
    Campaign,
    Date,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("Expected YYYY-MM-DD: {err}"))
}
