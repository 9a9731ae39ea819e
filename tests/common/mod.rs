#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use campaign_kpi::source::RawTable;
use tempfile::{TempDir, tempdir};

/// Canonical upload with one duplicate key, one silent row and revenue
/// reported without purchases.
pub const CANONICAL_CSV: &str = "\
account_id,campaign_id,campaign_name,date,spend,impressions,clicks,purchases,revenue
acct_1,c1,Spring Sale,2024-03-02,50,1000,40,2,400
acct_1,c2,Brand,2024-03-01,0,1000,0,0,0
acct_1,c1,Spring Sale,2024-03-01,25.5,500,10,0,500
acct_1,c1,Spring Sale,2024-03-01,99,999,99,9,999
";

/// Platform export headers, as downloaded from the ads manager.
pub const PLATFORM_CSV: &str = "\
Campaign name,Reporting starts,Amount spent (INR),Impressions,Link clicks,Results,Reach
Summer Push,2024-06-01,120.5,4000,80,3,3500
Summer Push,2024-06-02,99.5,3000,120,0,2800
Retarget,2024-06-01,40,1000,1200,1,900
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds a raw table from string literals.
pub fn raw_table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect(),
    )
}

/// Parses delimited text the way the file loader would.
pub fn raw_from_csv(text: &str) -> RawTable {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = reader
        .records()
        .map(|record| record.expect("record").iter().map(|v| v.to_string()).collect())
        .collect();
    RawTable::new(headers, rows)
}
