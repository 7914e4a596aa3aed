use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::importer::{product_values, read_sheet};
use crate::settings::load_settings;

pub fn run(file: &str, sheet: Option<&str>) -> Result<()> {
    let columns = load_settings().columns;
    let sheet = read_sheet(Path::new(file), sheet)?;

    let role = |header: &str| {
        if header == columns.salesperson {
            "salesperson"
        } else if header == columns.amount {
            "amount"
        } else if header == columns.client_id {
            "client"
        } else if header == columns.product {
            "product"
        } else {
            ""
        }
    };

    let mut table = Table::new();
    table.set_header(vec!["#", "Column", "Role"]);
    for (i, header) in sheet.headers.iter().enumerate() {
        table.add_row(vec![Cell::new(i + 1), Cell::new(header), Cell::new(role(header))]);
    }
    println!("{} data rows\n{table}", sheet.rows.len());

    let missing: Vec<&str> = columns
        .required()
        .into_iter()
        .filter(|name| !sheet.has_column(name))
        .collect();
    if missing.is_empty() {
        println!("{}", "All required columns present.".green());
        if sheet.has_column(&columns.product) {
            let rows = sheet.into_rows(&columns)?;
            println!("Products: {}", product_values(&rows).join(", "));
        }
    } else {
        println!("{} {}", "Missing required columns:".red().bold(), missing.join(", "));
    }
    Ok(())
}
