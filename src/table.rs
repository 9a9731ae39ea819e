use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    data::{Cell, format_number},
    kpi::Tabular,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Renders a console table. Numeric columns are right-aligned and shown with
/// at most four decimals; text columns are left-aligned.
pub fn render_table(tabular: &Tabular) -> String {
    let column_count = tabular.headers.len();
    let aligns = (0..column_count)
        .map(|idx| {
            let numeric = tabular
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.is_null())
                .all(|cell| cell.as_number().is_some());
            if numeric { Align::Right } else { Align::Left }
        })
        .collect::<Vec<_>>();
    let rows = tabular
        .rows
        .iter()
        .map(|row| row.iter().map(display_cell).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = tabular
        .headers
        .iter()
        .map(|h| display_width(h))
        .collect::<Vec<_>>();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(&tabular.headers, &widths, &aligns);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths, &aligns);
    let _ = writeln!(output, "{separator_line}");

    for row in &rows {
        let row_line = format_row(row, &widths, &aligns);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(tabular: &Tabular) {
    let rendered = render_table(tabular);
    print!("{rendered}");
}

fn display_cell(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) if n.fract() != 0.0 => {
            let rounded = (n * 10_000.0).round() / 10_000.0;
            format_number(rounded)
        }
        other => other.as_display(),
    }
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        let pad = " ".repeat(padding);
        let cell = match aligns.get(idx).copied().unwrap_or(Align::Left) {
            Align::Left => format!("{sanitized}{pad}"),
            Align::Right => format!("{pad}{sanitized}"),
        };
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
