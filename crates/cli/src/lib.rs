pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "landed",
    about = "Operator CLI for the landed-cost purchasing bot",
    long_about = "Inspect configuration, run readiness checks, price items and list stored orders.",
    after_help = "Examples:\n  landed doctor --json\n  landed quote --price 100 --weight 1\n  \
                  landed orders list"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, orders directory and exchange-rate provider readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute the landed cost of one item with the configured rates")]
    Quote {
        #[arg(long, help = "Listed price in the source currency, e.g. 89.95 or 89,95")]
        price: String,
        #[arg(long, default_value = "ems", help = "Shipping tier code")]
        tier: String,
        #[arg(long, help = "Parcel weight in kilograms, e.g. 1.5")]
        weight: String,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the shipping tariff tables")]
    Tariffs {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Inspect stored orders")]
    Orders(OrdersCommand),
}

#[derive(Debug, Subcommand)]
enum OrdersCommand {
    #[command(about = "List order files in the configured orders directory")]
    List {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Quote { price, tier, weight, json } => {
            commands::quote::run(&price, &tier, &weight, json)
        }
        Command::Tariffs { json } => commands::tariffs::run(json),
        Command::Orders(OrdersCommand::List { json }) => commands::orders::list(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
