mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::batch::{BatchArgs, BatchDcfArgs};
use commands::pe::LboArgs;
use commands::valuation::{CompsArgs, DcfArgs, WaccArgs};

/// Equity valuation: WACC, DCF, trading comparables and LBO
#[derive(Parser)]
#[command(
    name = "eqv",
    version,
    about = "Equity valuation with decimal precision",
    long_about = "A CLI for valuing companies with decimal precision. Supports WACC, \
                  discounted cash flow, trading comparables, leveraged buyout returns \
                  and parallel batch valuation."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Diagnostic log level on stderr (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate Weighted Average Cost of Capital
    Wacc(WaccArgs),
    /// Run a Discounted Cash Flow valuation
    Dcf(DcfArgs),
    /// Comparable company analysis
    Comps(CompsArgs),
    /// Leveraged buyout returns (IRR, MOIC)
    Lbo(LboArgs),
    /// Run a mixed list of valuation requests in parallel
    Batch(BatchArgs),
    /// Run one set of DCF assumptions across many tickers in parallel
    BatchDcf(BatchDcfArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.log_json);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Wacc(args) => commands::valuation::run_wacc(args),
        Commands::Dcf(args) => commands::valuation::run_dcf(args),
        Commands::Comps(args) => commands::valuation::run_comps(args),
        Commands::Lbo(args) => commands::pe::run_lbo(args),
        Commands::Batch(args) => commands::batch::run_batch(args),
        Commands::BatchDcf(args) => commands::batch::run_batch_dcf(args),
        Commands::Version => {
            println!("eqv {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
