pub mod cli;
pub mod config;
pub mod data;
pub mod export;
pub mod gate;
pub mod insights;
pub mod io_utils;
pub mod kpi;
pub mod pipeline;
pub mod process;
pub mod record;
pub mod source;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::AppConfig,
    data::Cell,
    kpi::Tabular,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("campaign_kpi", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Process(args) => process::execute(&args),
        Commands::Fetch(args) => process::fetch(&args),
        Commands::Accounts(args) => handle_accounts(&args),
    }
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let input = &args.input.input;
    info!(
        "Validating '{}' with delimiter '{}'",
        input.display(),
        printable_delimiter(io_utils::resolve_input_delimiter(input, args.input.delimiter))
    );
    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let raw = source::load_table(input, args.input.delimiter, encoding)
        .with_context(|| format!("Loading {input:?}"))?;
    debug!("Headers: {:?}", raw.headers);
    let admission = gate::admit(&raw, &config.validation)?;
    println!("{}", admission.message());
    Ok(())
}

fn handle_accounts(args: &cli::AccountsArgs) -> Result<()> {
    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let client = process::graph_client(&args.token_env, &config)?;
    let owner = client.validate_token()?;
    let accounts = client.ad_accounts()?;
    info!(
        "{} ad account(s) available to {}",
        accounts.len(),
        owner.name.as_deref().unwrap_or(owner.id.as_str())
    );
    let optional = |value: Option<String>| value.map(Cell::Text).unwrap_or(Cell::Null);
    let listing = Tabular {
        headers: ["id", "name", "currency", "account_status"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        rows: accounts
            .into_iter()
            .map(|account| {
                vec![
                    Cell::Text(account.id),
                    optional(account.name),
                    optional(account.currency),
                    account
                        .account_status
                        .map(Cell::Integer)
                        .unwrap_or(Cell::Null),
                ]
            })
            .collect(),
    };
    table::print_table(&listing);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
