use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{Cell, CommissionSummary};
use crate::pipeline::RunReport;

const SUMMARY_HEADERS: [&str; 6] = [
    "salesperson",
    "total_sales",
    "invoice_count",
    "unique_clients",
    "rate_percent",
    "commission",
];

pub const SUMMARY_FILE: &str = "commissions.csv";
pub const PROCESSED_FILE: &str = "processed.csv";
pub const CANCELLED_FILE: &str = "cancelled.csv";
pub const INVALID_FILE: &str = "invalid.csv";

/// `reporte_comisiones-YYYY-MM-DD`, with `.xlsx` when workbooks are enabled.
pub fn default_output_path() -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let stem = format!("reporte_comisiones-{date}");
    if cfg!(feature = "xlsx") {
        PathBuf::from(format!("{stem}.xlsx"))
    } else {
        PathBuf::from(stem)
    }
}

fn is_workbook_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// Write the report as a workbook when `path` ends in `.xlsx`, otherwise as
/// CSV files inside the directory `path`. Returns the written paths.
pub fn write_report(report: &RunReport, headers: &[String], path: &Path) -> Result<Vec<PathBuf>> {
    if is_workbook_path(path) {
        write_workbook(report, headers, path)?;
        return Ok(vec![path.to_path_buf()]);
    }
    write_csv_dir(report, headers, path)
}

// ---------------------------------------------------------------------------
// Sheet names
// ---------------------------------------------------------------------------

/// Excel sheet names: at most 31 characters, none of `/ \ ? * [ ] :`.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '*' | '[' | ']' | ':' => '_',
            c => c,
        })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Sanitized name not yet in `taken`. Excel compares sheet names
/// case-insensitively.
fn unique_sheet_name(name: &str, taken: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(name);
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let keep = 31usize.saturating_sub(suffix.chars().count());
        candidate = format!("{}{suffix}", base.chars().take(keep).collect::<String>());
        n += 1;
    }
    taken.insert(candidate.to_lowercase());
    candidate
}

fn file_stem(name: &str) -> String {
    sanitize_sheet_name(name)
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// File stem not yet in `taken`, compared case-insensitively since products
/// such as `Vida/Salud` and `Vida_Salud` share a stem.
fn unique_file_stem(name: &str, taken: &mut HashSet<String>) -> String {
    let base = file_stem(name);
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate.to_lowercase()) {
        candidate = format!("{base} ({n})");
        n += 1;
    }
    taken.insert(candidate.to_lowercase());
    candidate
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn summary_record(s: &CommissionSummary) -> Vec<String> {
    vec![
        s.salesperson.clone(),
        format!("{:.2}", s.total_sales),
        s.invoice_count.to_string(),
        s.unique_clients.to_string(),
        format!("{}", s.rate * 100.0),
        format!("{:.2}", s.commission),
    ]
}

fn write_summary_csv(summaries: &[CommissionSummary], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(SUMMARY_HEADERS)?;
    for s in summaries {
        wtr.write_record(summary_record(s))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_csv_dir(report: &RunReport, headers: &[String], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join(SUMMARY_FILE);
    write_summary_csv(&report.summaries, &path)?;
    written.push(path);

    let mut stems = HashSet::new();
    for (product, summaries) in &report.by_product {
        let stem = unique_file_stem(product, &mut stems);
        let path = dir.join(format!("commissions_{stem}.csv"));
        write_summary_csv(summaries, &path)?;
        written.push(path);
    }

    let path = dir.join(PROCESSED_FILE);
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(headers)?;
    for record in &report.outcome.surviving {
        wtr.write_record(record.fields.iter().map(|(_, cell)| cell.to_string()))?;
    }
    wtr.flush()?;
    written.push(path);

    let path = dir.join(CANCELLED_FILE);
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["pair", "side", "row", "salesperson", "client_id", "amount"])?;
    for (i, pair) in report.outcome.cancelled.iter().enumerate() {
        for (side, record) in [("negative", &pair.negative), ("positive", &pair.positive)] {
            wtr.write_record([
                (i + 1).to_string(),
                side.to_string(),
                record.row.to_string(),
                record.salesperson.clone(),
                record.client_id.clone(),
                format!("{:.2}", record.amount),
            ])?;
        }
    }
    wtr.flush()?;
    written.push(path);

    let path = dir.join(INVALID_FILE);
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["row", "value", "reason"])?;
    for invalid in &report.outcome.invalid {
        wtr.write_record([invalid.row.to_string(), invalid.value.clone(), invalid.reason.to_string()])?;
    }
    wtr.flush()?;
    written.push(path);

    Ok(written)
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn write_summary_sheet(
    sheet: &mut rust_xlsxwriter::Worksheet,
    summaries: &[CommissionSummary],
    bold: &rust_xlsxwriter::Format,
    money: &rust_xlsxwriter::Format,
) -> Result<()> {
    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, bold)?;
    }
    for (i, s) in summaries.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &s.salesperson)?;
        sheet.write_number_with_format(row, 1, s.total_sales, money)?;
        sheet.write_number(row, 2, s.invoice_count as f64)?;
        sheet.write_number(row, 3, s.unique_clients as f64)?;
        sheet.write_number(row, 4, s.rate * 100.0)?;
        sheet.write_number_with_format(row, 5, s.commission, money)?;
    }
    Ok(())
}

/// One sheet per product (or a single `Commissions` sheet when the data has
/// no product breakdown), then `Processed Data` with the surviving rows.
#[cfg(feature = "xlsx")]
fn write_workbook(report: &RunReport, headers: &[String], path: &Path) -> Result<()> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");
    let mut taken = HashSet::new();

    if report.by_product.is_empty() {
        let name = unique_sheet_name("Commissions", &mut taken);
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_summary_sheet(sheet, &report.summaries, &bold, &money)?;
    } else {
        for (product, summaries) in &report.by_product {
            let name = unique_sheet_name(product, &mut taken);
            let sheet = workbook.add_worksheet();
            sheet.set_name(name)?;
            write_summary_sheet(sheet, summaries, &bold, &money)?;
        }
    }

    let name = unique_sheet_name("Processed Data", &mut taken);
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }
    for (i, record) in report.outcome.surviving.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, (_, cell)) in record.fields.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.write_number(row, col, *n)?;
                }
                Cell::Text(s) => {
                    sheet.write_string(row, col, s)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(row, col, *b)?;
                }
            }
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    workbook.save(path)?;
    Ok(())
}

#[cfg(not(feature = "xlsx"))]
fn write_workbook(_report: &RunReport, _headers: &[String], path: &Path) -> Result<()> {
    Err(crate::error::TallyError::UnsupportedFormat(format!(
        "{} (built without the xlsx feature)",
        path.display()
    )))
}
