use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{io_utils, source::RawTable};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Reads a delimited file or the first sheet of a workbook into a raw table.
pub fn load_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<RawTable> {
    let table = if is_spreadsheet(path) {
        read_spreadsheet(path)?
    } else {
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        read_delimited(path, delimiter, encoding)?
    };
    info!(
        "Loaded {} row(s) and {} column(s) from {:?}",
        table.len(),
        table.headers.len(),
        path
    );
    Ok(table)
}

pub fn read_delimited(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<RawTable> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        debug!("{path:?} has no header row");
        return Ok(RawTable::default());
    }
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", idx + 2))?;
        rows.push(decoded);
    }
    Ok(RawTable::new(headers, rows))
}

pub fn read_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let Some(sheet) = sheet_names.first() else {
        bail!("Workbook {path:?} has no sheets");
    };
    debug!(
        "Reading sheet '{}' (first of {} sheet(s))",
        sheet,
        sheet_names.len()
    );
    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("Reading sheet '{sheet}' from {path:?}"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(RawTable::default());
    };
    let headers = header_row.iter().map(cell_text).collect::<Vec<_>>();
    let body = rows
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    Ok(RawTable::new(headers, body))
}

/// Renders a spreadsheet cell the way it would have appeared in a CSV export.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                // integral floats are usually ids or counts; keep them free of ".0"
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.date().format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn spreadsheet_detection_is_case_insensitive() {
        assert!(is_spreadsheet(Path::new("report.XLSX")));
        assert!(is_spreadsheet(Path::new("report.ods")));
        assert!(!is_spreadsheet(Path::new("report.csv")));
        assert!(!is_spreadsheet(Path::new("report")));
    }

    #[test]
    fn read_delimited_keeps_header_spelling_and_pads_rows() {
        let mut file = NamedTempFile::with_suffix(".csv").expect("temp file");
        write!(file, "Campaign name,Amount spent (INR),Link clicks\nSpring,10.5\n").unwrap();
        let table = load_table(file.path(), None, UTF_8).expect("load csv");
        assert_eq!(
            table.headers,
            vec!["Campaign name", "Amount spent (INR)", "Link clicks"]
        );
        assert_eq!(table.rows, vec![vec!["Spring", "10.5", ""]]);
    }

    #[test]
    fn read_delimited_on_empty_file_yields_empty_table() {
        let file = NamedTempFile::with_suffix(".csv").expect("temp file");
        let table = load_table(file.path(), None, UTF_8).expect("load empty csv");
        assert!(table.headers.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn cell_text_drops_integral_fraction() {
        assert_eq!(cell_text(&Data::Float(1200.0)), "1200");
        assert_eq!(cell_text(&Data::Float(12.25)), "12.25");
        assert_eq!(cell_text(&Data::String("  x ".into())), "x");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
