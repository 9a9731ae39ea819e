//! Writers for enriched tables.
//!
//! Numbers are written in their shortest round-trip form and dates as
//! `YYYY-MM-DD`, so feeding a row-level export back through the pipeline
//! reproduces the base metrics. The same holds for workbooks, where numbers
//! are stored as numeric cells and dates as text.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use serde_json::{Map, Value};

use crate::{data::Cell, kpi::Tabular};

pub const XLSX_SHEET_NAME: &str = "KPIs";

pub fn write_delimited<W: Write>(tabular: &Tabular, writer: &mut csv::Writer<W>) -> Result<()> {
    writer
        .write_record(&tabular.headers)
        .context("Writing header row")?;
    for (idx, row) in tabular.rows.iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.as_display()))
            .with_context(|| format!("Writing output row {}", idx + 1))?;
    }
    writer.flush().context("Flushing delimited output")?;
    Ok(())
}

/// One flat JSON object per row, keys in column order.
pub fn json_records(tabular: &Tabular) -> Vec<Value> {
    tabular
        .rows
        .iter()
        .map(|row| {
            let object = tabular
                .headers
                .iter()
                .zip(row)
                .map(|(name, cell)| (name.clone(), cell.to_json()))
                .collect::<Map<String, Value>>();
            Value::Object(object)
        })
        .collect()
}

pub fn write_json<W: Write>(tabular: &Tabular, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, &json_records(tabular))
        .context("Serializing JSON records")?;
    writeln!(writer).context("Writing JSON output")?;
    writer.flush().context("Flushing JSON output")?;
    Ok(())
}

/// Writes a single-sheet workbook with a bold header row. Null cells are
/// left empty.
pub fn write_xlsx(tabular: &Tabular, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(XLSX_SHEET_NAME)
        .context("Naming the KPI worksheet")?;
    for (col, name) in tabular.headers.iter().enumerate() {
        let col = u16::try_from(col).context("Too many columns for a worksheet")?;
        sheet
            .write_string_with_format(0, col, name, &header_format)
            .context("Writing header row")?;
    }
    for (idx, row) in tabular.rows.iter().enumerate() {
        let line = u32::try_from(idx + 1).context("Too many rows for a worksheet")?;
        for (col, cell) in row.iter().enumerate() {
            let col = u16::try_from(col).context("Too many columns for a worksheet")?;
            let written = match cell {
                Cell::Null => continue,
                Cell::Number(n) => sheet.write_number(line, col, *n),
                Cell::Integer(i) => sheet.write_number(line, col, *i as f64),
                Cell::Text(_) | Cell::Date(_) => sheet.write_string(line, col, cell.as_display()),
            };
            written.with_context(|| format!("Writing output row {}", idx + 1))?;
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("Saving workbook {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::file::read_spreadsheet;
    use chrono::NaiveDate;

    fn sample() -> Tabular {
        Tabular {
            headers: vec!["campaign_name".into(), "date".into(), "spend".into(), "cpa".into()],
            rows: vec![vec![
                Cell::Text("Spring, \"Launch\"".into()),
                Cell::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
                Cell::Number(0.1 + 0.2),
                Cell::Null,
            ]],
        }
    }

    #[test]
    fn delimited_output_quotes_only_when_needed() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_delimited(&sample(), &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "campaign_name,date,spend,cpa\n\"Spring, \"\"Launch\"\"\",2024-04-01,0.30000000000000004,\n"
        );
    }

    #[test]
    fn json_records_keep_column_order_and_nulls() {
        let records = json_records(&sample());
        let object = records[0].as_object().unwrap();
        let keys = object.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["campaign_name", "date", "spend", "cpa"]);
        assert_eq!(object["date"], Value::String("2024-04-01".into()));
        assert!(object["cpa"].is_null());
    }

    #[test]
    fn write_json_emits_an_array() {
        let mut buffer = Vec::new();
        write_json(&sample(), &mut buffer).unwrap();
        let parsed: Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed.as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn workbook_reads_back_as_the_delimited_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpis.xlsx");
        let mut tabular = sample();
        tabular.headers.push("clicks".into());
        tabular.rows[0].push(Cell::Integer(40));
        write_xlsx(&tabular, &path).unwrap();

        let raw = read_spreadsheet(&path).unwrap();
        assert_eq!(raw.headers, vec!["campaign_name", "date", "spend", "cpa", "clicks"]);
        assert_eq!(
            raw.rows[0],
            vec!["Spring, \"Launch\"", "2024-04-01", "0.30000000000000004", "", "40"]
        );
    }
}
