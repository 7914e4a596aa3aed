pub mod columns;
pub mod config;
pub mod report;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Sales commission calculator: nets out reversed invoices, then totals commissions per salesperson."
)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cancel reversal pairs and compute commissions for a CSV/XLSX file.
    Report {
        /// Path to a CSV or XLSX file with one invoice per row
        file: String,
        /// Flat commission rate in percent (overrides the configured policy)
        #[arg(long)]
        rate: Option<f64>,
        /// Only include rows with this product (repeatable)
        #[arg(long = "product")]
        products: Vec<String>,
        /// Worksheet to read (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
        /// Export the report: a .xlsx path writes a workbook, anything else a
        /// directory of CSV files. Without a value a dated name is used.
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        output: Option<String>,
        /// Print the full run as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// List the columns of a file and check the required ones are present.
    Columns {
        /// Path to a CSV or XLSX file
        file: String,
        /// Worksheet to read (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current settings and where they are stored.
    Show,
    /// Update one or more settings.
    Set {
        /// Header of the salesperson column
        #[arg(long = "salesperson-column")]
        salesperson_column: Option<String>,
        /// Header of the invoice total column
        #[arg(long = "amount-column")]
        amount_column: Option<String>,
        /// Header of the client identifier column
        #[arg(long = "client-column")]
        client_column: Option<String>,
        /// Header of the optional product column
        #[arg(long = "product-column")]
        product_column: Option<String>,
        /// Use a flat commission rate, in percent
        #[arg(long, conflicts_with = "tiered")]
        rate: Option<f64>,
        /// Restore the default tiered schedule (0.5% under 3 invoices, 1% from 3)
        #[arg(long)]
        tiered: bool,
        /// Label for rows without a salesperson
        #[arg(long = "unassigned-label")]
        unassigned_label: Option<String>,
    },
}
