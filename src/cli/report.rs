use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::commission::RatePolicy;
use crate::error::Result;
use crate::export::{default_output_path, write_report};
use crate::fmt::{money, percent};
use crate::importer::read_sheet;
use crate::models::CommissionSummary;
use crate::pipeline::{self, RunOptions, RunReport};
use crate::settings::load_settings;

pub fn run(
    file: &str,
    rate: Option<f64>,
    products: Vec<String>,
    sheet: Option<&str>,
    output: Option<&str>,
    json: bool,
) -> Result<()> {
    let settings = load_settings();
    let policy = match rate {
        Some(p) => RatePolicy::flat(p)?,
        None => settings.rate,
    };

    let sheet = read_sheet(Path::new(file), sheet)?;
    let headers = sheet.headers.clone();
    let product_column = sheet.has_column(&settings.columns.product);
    let rows = sheet.into_rows(&settings.columns)?;

    let opts = RunOptions {
        policy,
        unassigned_label: settings.unassigned_label.clone(),
        product_column,
        products,
    };
    let report = pipeline::run(rows, &opts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_statistics(&report);
        println!("Rate: {}", policy.describe());
        print_summaries("Commissions by Salesperson", &report.summaries);
        print_totals(&report);
        for (product, summaries) in &report.by_product {
            print_summaries(&format!("Product: {product}"), summaries);
        }
        print_invalid(&report);
    }

    if let Some(out) = output {
        let path = if out.is_empty() {
            default_output_path()
        } else {
            PathBuf::from(out)
        };
        for written in write_report(&report, &headers, &path)? {
            // stdout carries the JSON document in --json mode
            if json {
                eprintln!("Wrote {}", written.display());
            } else {
                println!("Wrote {}", written.display());
            }
        }
    }
    Ok(())
}

fn print_statistics(report: &RunReport) {
    let mut table = Table::new();
    table.set_header(vec!["Processing", ""]);
    table.add_row(vec![Cell::new("Rows read"), Cell::new(report.input_rows)]);
    if report.filtered_out > 0 {
        table.add_row(vec![Cell::new("Filtered out (product)"), Cell::new(report.filtered_out)]);
    }
    table.add_row(vec![
        Cell::new("Cancelled (reversal pairs)"),
        Cell::new(format!(
            "{} ({} pairs)",
            report.outcome.cancelled_records(),
            report.outcome.cancelled.len()
        )),
    ]);
    table.add_row(vec![Cell::new("Invalid"), Cell::new(report.outcome.invalid.len())]);
    table.add_row(vec![Cell::new("Surviving"), Cell::new(report.outcome.surviving.len())]);
    table.add_row(vec![Cell::new("Gross sales"), Cell::new(money(report.gross_sales))]);
    table.add_row(vec![Cell::new("Net sales"), Cell::new(money(report.net_sales))]);
    println!("Processing\n{table}");
}

fn print_summaries(title: &str, summaries: &[CommissionSummary]) {
    if summaries.is_empty() {
        println!("\n{title}\n  (no surviving records)");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Salesperson", "Total Sales", "Invoices", "Clients", "Rate", "Commission"]);
    for s in summaries {
        let total = if s.total_sales < 0.0 {
            money(s.total_sales).red().to_string()
        } else {
            money(s.total_sales)
        };
        table.add_row(vec![
            Cell::new(&s.salesperson),
            Cell::new(total),
            Cell::new(s.invoice_count),
            Cell::new(s.unique_clients),
            Cell::new(percent(s.rate)),
            Cell::new(money(s.commission)),
        ]);
    }
    println!("\n{title}\n{table}");
}

fn print_totals(report: &RunReport) {
    let t = &report.totals;
    println!(
        "{} {} salespeople, {} net sales, {} commissions ({} average)",
        "Total:".bold(),
        t.salespeople,
        money(t.total_sales),
        money(t.total_commission),
        money(t.average_commission)
    );
}

fn print_invalid(report: &RunReport) {
    let invalid = &report.outcome.invalid;
    if invalid.is_empty() {
        return;
    }
    println!(
        "\n{}",
        format!("{} row(s) skipped: amount is not a valid number", invalid.len()).yellow()
    );
    let mut table = Table::new();
    table.set_header(vec!["Row", "Value", "Reason"]);
    for i in invalid {
        table.add_row(vec![Cell::new(i.row), Cell::new(&i.value), Cell::new(i.reason)]);
    }
    println!("{table}");
}
