mod cli;
mod commission;
mod error;
mod export;
mod fmt;
mod importer;
mod logging;
mod matcher;
mod models;
mod pipeline;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Report {
            file,
            rate,
            products,
            sheet,
            output,
            json,
        } => cli::report::run(&file, rate, products, sheet.as_deref(), output.as_deref(), json),
        Commands::Columns { file, sheet } => cli::columns::run(&file, sheet.as_deref()),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::Set {
                salesperson_column,
                amount_column,
                client_column,
                product_column,
                rate,
                tiered,
                unassigned_label,
            } => cli::config::set(
                salesperson_column,
                amount_column,
                client_column,
                product_column,
                rate,
                tiered,
                unassigned_label,
            ),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
