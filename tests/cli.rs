mod common;

use std::fs;

use assert_cmd::Command;
use common::{CANONICAL_CSV, PLATFORM_CSV, TestWorkspace};
use predicates::{prelude::*, str::contains};
use serde_json::Value;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("campaign-kpi").expect("binary exists");
    cmd.env_remove("OPENAI_API_KEY");
    cmd
}

#[test]
fn validate_accepts_a_canonical_upload() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    bin()
        .args(["validate", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Validation successful"));
}

#[test]
fn validate_rejects_platform_headers() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("export.csv", PLATFORM_CSV);
    bin()
        .args(["validate", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Missing required columns"));
}

#[test]
fn validate_reports_negative_spend() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "negative.csv",
        "account_id,campaign_id,date,spend,impressions,clicks\na,c,2024-01-01,-5,10,1\n",
    );
    bin()
        .args(["validate", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Negative values found in spend column"));
}

#[test]
fn process_writes_row_level_csv() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    let output = workspace.path().join("kpis.csv");
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let mut reader = csv::Reader::from_path(&output).expect("open output");
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "account_id");
    assert!(headers.iter().any(|h| h == "roas"));
    let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 3);
    let campaign = headers.iter().position(|h| h == "campaign_id").unwrap();
    assert_eq!(&rows[0][campaign], "c2");
}

#[test]
fn process_campaign_level_json_by_extension() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    let output = workspace.path().join("campaigns.json");
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--level",
            "campaign",
        ])
        .assert()
        .success();

    let parsed: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let campaigns = parsed.as_array().unwrap();
    assert_eq!(campaigns.len(), 2);
    assert!(campaigns.iter().any(|c| c["campaign_id"] == "c1" && c["rows"] == 2));
}

#[test]
fn process_writes_a_workbook_by_extension() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    let output = workspace.path().join("kpis.xlsx");
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let raw = campaign_kpi::source::load_table(&output, None, encoding_rs::UTF_8)
        .expect("workbook readable");
    assert_eq!(raw.headers[0], "account_id");
    assert!(raw.headers.iter().any(|h| h == "roas"));
    assert_eq!(raw.rows.len(), 3);
}

#[test]
fn workbook_output_needs_a_file() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    bin()
        .args(["process", "-i", input.to_str().unwrap(), "--format", "xlsx"])
        .assert()
        .failure()
        .stderr(contains("xlsx output needs an output file"));
}

#[test]
fn process_renders_a_table_to_stdout() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "--level",
            "date",
            "--table",
        ])
        .assert()
        .success()
        .stdout(contains("active_campaigns").and(contains("2024-03-02")));
}

#[test]
fn process_limit_caps_stdout_rows() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    let assert = bin()
        .args(["process", "-i", input.to_str().unwrap(), "--limit", "1"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.lines().count(), 2);
}

#[test]
fn platform_export_needs_skip_validation() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("export.csv", PLATFORM_CSV);
    bin()
        .args(["process", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Missing required columns"));

    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "--skip-validation",
            "--format",
            "tsv",
        ])
        .assert()
        .success()
        .stdout(contains("account_001\tretarget_2\tRetarget"));
}

#[test]
fn config_overrides_default_account_and_currency() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("export.csv", PLATFORM_CSV);
    let config = workspace.write(
        "run.yaml",
        "default_account_id: acct_from_config\ncurrency_symbol: \"$\"\n",
    );
    let insights = workspace.path().join("insights.md");
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "--skip-validation",
            "-c",
            config.to_str().unwrap(),
            "--insights",
            insights.to_str().unwrap(),
            "--offline",
        ])
        .assert()
        .success()
        .stdout(contains("acct_from_config"));

    let report = fs::read_to_string(&insights).unwrap();
    assert!(report.contains("- **Total Spend:** $260.00"));
}

#[test]
fn offline_insights_use_the_basic_report() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    let output = workspace.path().join("kpis.csv");
    let insights = workspace.path().join("insights.md");
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--insights",
            insights.to_str().unwrap(),
            "--offline",
        ])
        .assert()
        .success();

    let report = fs::read_to_string(&insights).unwrap();
    assert!(report.starts_with("# Campaign Performance Analysis"));
    assert!(report.contains("- **Total Campaigns:** 2"));
    assert!(report.contains("Spring Sale"));
}

#[test]
fn missing_model_key_falls_back_without_failing() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("upload.csv", CANONICAL_CSV);
    let output = workspace.path().join("kpis.csv");
    let insights = workspace.path().join("insights.md");
    bin()
        .args([
            "process",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--insights",
            insights.to_str().unwrap(),
        ])
        .assert()
        .success();
    assert!(
        fs::read_to_string(&insights)
            .unwrap()
            .contains("(Basic Insights)")
    );
}

#[test]
fn fetch_rejects_an_inverted_range() {
    bin()
        .args([
            "fetch",
            "--account",
            "act_1",
            "--since",
            "2024-03-10",
            "--until",
            "2024-03-01",
        ])
        .assert()
        .failure()
        .stderr(contains("must not be earlier than"));
}

#[test]
fn fetch_requires_a_token() {
    bin()
        .env_remove("CAMPAIGN_KPI_TEST_TOKEN")
        .args([
            "fetch",
            "--account",
            "act_1",
            "--since",
            "2024-03-01",
            "--until",
            "2024-03-02",
            "--token-env",
            "CAMPAIGN_KPI_TEST_TOKEN",
        ])
        .assert()
        .failure()
        .stderr(contains("CAMPAIGN_KPI_TEST_TOKEN"));
}

#[test]
fn unknown_delimiter_is_a_usage_error() {
    bin()
        .args(["validate", "-i", "whatever.csv", "--delimiter", "ab"])
        .assert()
        .failure()
        .stderr(contains("delimiter"));
}
