mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::loans::{AmortizeArgs, LoanPolicyArgs};
use commands::payroll::{CalculateArgs, PreviewArgs, TotalsArgs};
use commands::run::RunArgs;

/// Payroll runs, scenario previews and loan amortization
#[derive(Parser)]
#[command(
    name = "payroll",
    version,
    about = "Payroll runs, scenario previews and loan amortization",
    long_about = "A CLI for employee payroll with decimal precision. Calculates pro-rated \
                  salaries, allowances and deductions, previews what-if scenarios, generates \
                  payroll runs against a loan book, and builds loan amortization schedules."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Company payroll settings (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a loan amortization schedule
    Amortize(AmortizeArgs),
    /// Check a loan against affordability and approval rules
    LoanPolicy(LoanPolicyArgs),
    /// Calculate one employee's payroll entry
    Calculate(CalculateArgs),
    /// Compare what-if scenarios against a baseline
    Preview(PreviewArgs),
    /// Generate a payroll run and apply its loan deductions
    Run(RunArgs),
    /// Sum payroll entries and check they balance
    Totals(TotalsArgs),
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

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match input::config::load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(2);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Amortize(args) => commands::loans::run_amortize(args),
        Commands::LoanPolicy(args) => commands::loans::run_loan_policy(args),
        Commands::Calculate(args) => commands::payroll::run_calculate(args, &settings),
        Commands::Preview(args) => {
            commands::payroll::run_preview(args, cli.config.is_some().then_some(&settings))
        }
        Commands::Run(args) => commands::run::run_payroll(args, settings),
        Commands::Totals(args) => commands::payroll::run_totals(args),
        Commands::Version => {
            println!("payroll {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
