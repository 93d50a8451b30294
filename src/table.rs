//! Plain-text tables for terminal listings.
//!
//! Columns whose cells are all numeric are right-aligned; everything else is
//! left-aligned. Widths count characters, so CJK codes line up only roughly.

use std::fmt::Write as _;

pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(1))
        .collect::<Vec<_>>();
    let mut numeric = vec![!rows.is_empty(); column_count];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(cell.chars().count());
            if !cell.is_empty() && cell.parse::<f64>().is_err() {
                numeric[idx] = false;
            }
        }
    }

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths, &numeric));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &numeric));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize], numeric: &[bool]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .zip(numeric)
        .map(|((value, width), right)| {
            let value = value.replace(['\n', '\r', '\t'], " ");
            if *right {
                format!("{value:>width$}")
            } else {
                format!("{value:<width$}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}
