use std::{env, fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{
    cli::{FetchArgs, Level, OutputArgs, OutputFormat, ProcessArgs},
    config::AppConfig,
    export, gate,
    insights::{self, Insights, llm::ChatClient},
    io_utils,
    kpi::{self, KpiTable, Tabular},
    pipeline::{self, PipelineOptions, PipelineOutput},
    source::{
        self,
        remote::{DateRange, GraphClient, HttpTransport},
    },
    table,
};

pub fn execute(args: &ProcessArgs) -> Result<()> {
    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let input = &args.input.input;
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let raw = source::load_table(input, args.input.delimiter, encoding)
        .with_context(|| format!("Loading {input:?}"))?;

    if args.skip_validation {
        info!("Skipping admission check for {input:?}");
    } else {
        let admission = gate::admit(&raw, &config.validation)?;
        info!("{}", admission.message());
    }

    let output = pipeline::run(raw, &PipelineOptions::from_config(&config))?;
    emit(output, &args.output, &config)
}

pub fn fetch(args: &FetchArgs) -> Result<()> {
    if args.until < args.since {
        bail!(
            "--until ({}) must not be earlier than --since ({})",
            args.until,
            args.since
        );
    }
    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let client = graph_client(&args.token_env, &config)?;
    client.validate_token()?;

    let range = DateRange {
        since: args.since,
        until: args.until,
    };
    info!(
        "Fetching {} account(s) from {} to {}",
        args.accounts.len(),
        range.since,
        range.until
    );
    let report = client.fetch_accounts(&args.accounts, &range)?;
    for failure in &report.failures {
        warn!("Skipped {}: {}", failure.account_id, failure.error);
    }
    if report.table.is_empty() {
        warn!("No records returned for the selected accounts and date range");
    }

    let output = pipeline::run(report.table, &PipelineOptions::from_config(&config))?;
    emit(output, &args.output, &config)
}

pub fn graph_client(token_env: &str, config: &AppConfig) -> Result<GraphClient<HttpTransport>> {
    let token = env::var(token_env)
        .ok()
        .filter(|token| !token.trim().is_empty())
        .with_context(|| format!("Environment variable {token_env} holding the access token is not set"))?;
    let transport = HttpTransport::new(token, Duration::from_secs(config.remote.timeout_secs))?;
    Ok(GraphClient::new(transport, &config.remote))
}

/// Computes KPIs at the requested level and writes them, plus the optional
/// narrative analysis.
fn emit(output: PipelineOutput, args: &OutputArgs, config: &AppConfig) -> Result<()> {
    let summary = output.table.summary();
    match summary.date_range {
        Some((first, last)) => info!(
            "{} record(s), {} campaign(s), {} account(s), {first} to {last}",
            summary.total_rows, summary.campaigns, summary.accounts
        ),
        None => warn!("No records left after processing; output will be empty"),
    }

    let kpis = KpiTable::from_canonical(output.table);
    let tabular = level_view(&kpis, args.level).truncated(args.limit);

    if args.table {
        table::print_table(&tabular);
    } else {
        write_output(&tabular, args.output.as_deref(), args.format)?;
    }

    if let Some(path) = &args.insights {
        let insights = narrative(&kpis, args.offline, config);
        fs::write(path, format!("{insights}\n"))
            .with_context(|| format!("Writing insights to {path:?}"))?;
        info!(
            "Insights ({}) written to {path:?}",
            if insights.is_fallback() { "basic" } else { "model" }
        );
    }
    Ok(())
}

pub fn level_view(kpis: &KpiTable, level: Level) -> Tabular {
    match level {
        Level::Row => kpis.to_tabular(),
        Level::Campaign => kpi::campaign_tabular(&kpi::campaign_summary(kpis)),
        Level::Date => kpi::date_tabular(&kpi::date_summary(kpis)),
    }
}

pub fn resolve_format(explicit: Option<OutputFormat>, path: Option<&Path>) -> OutputFormat {
    if let Some(format) = explicit {
        return format;
    }
    match path
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
    {
        Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => OutputFormat::Tsv,
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => OutputFormat::Xlsx,
        _ => OutputFormat::Csv,
    }
}

fn write_output(tabular: &Tabular, path: Option<&Path>, format: Option<OutputFormat>) -> Result<()> {
    let format = resolve_format(format, path);
    let target = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".into());
    match format {
        OutputFormat::Json => export::write_json(tabular, io_utils::open_output(path)?)?,
        OutputFormat::Xlsx => match path.filter(|p| !io_utils::is_dash(p)) {
            Some(path) => export::write_xlsx(tabular, path)?,
            None => bail!("xlsx output needs an output file (-o)"),
        },
        OutputFormat::Csv | OutputFormat::Tsv => {
            let delimiter = if format == OutputFormat::Tsv {
                io_utils::DEFAULT_TSV_DELIMITER
            } else {
                io_utils::DEFAULT_CSV_DELIMITER
            };
            let mut writer = io_utils::open_csv_writer(path, delimiter)?;
            export::write_delimited(tabular, &mut writer)?;
        }
    }
    info!("Wrote {} row(s) as {format:?} to {target}", tabular.rows.len());
    Ok(())
}

fn narrative(kpis: &KpiTable, offline: bool, config: &AppConfig) -> Insights {
    if offline {
        return insights::generate(None, kpis, &config.currency_symbol);
    }
    match ChatClient::from_config(&config.insights) {
        Ok(client) => insights::generate(Some(&client), kpis, &config.currency_symbol),
        Err(err) => {
            warn!("Language model unavailable: {err}");
            insights::generate(None, kpis, &config.currency_symbol)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_follows_flag_then_extension() {
        assert_eq!(
            resolve_format(Some(OutputFormat::Tsv), Some(&PathBuf::from("a.json"))),
            OutputFormat::Tsv
        );
        assert_eq!(
            resolve_format(None, Some(&PathBuf::from("a.JSON"))),
            OutputFormat::Json
        );
        assert_eq!(
            resolve_format(None, Some(&PathBuf::from("a.tsv"))),
            OutputFormat::Tsv
        );
        assert_eq!(
            resolve_format(None, Some(&PathBuf::from("kpis.xlsx"))),
            OutputFormat::Xlsx
        );
        assert_eq!(resolve_format(None, None), OutputFormat::Csv);
    }

    #[test]
    fn level_view_headers() {
        let kpis = KpiTable::default();
        assert_eq!(level_view(&kpis, Level::Row).headers[0], "account_id");
        assert_eq!(level_view(&kpis, Level::Campaign).headers[0], "campaign_id");
        assert_eq!(level_view(&kpis, Level::Date).headers[1], "active_campaigns");
    }
}
