//! TradeLens CLI — portfolio report and settings commands.
//!
//! Commands:
//! - `report` — simulate a trade dataset and write every report table
//! - `settings` — print the default report settings as TOML

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tradelens_core::data::InMemoryDataSource;
use tradelens_runner::report::{save_report, LogProgress};
use tradelens_runner::{Report, ReportGenerator, ReportInput, ReportSettings};

#[derive(Parser)]
#[command(name = "tradelens", about = "TradeLens CLI — portfolio analytics reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report from a JSON trade dataset.
    Report {
        /// Trades, instruments, strategies, tags, equity summaries (JSON).
        #[arg(long)]
        input: PathBuf,

        /// Price and fx history (JSON). Without it every instrument falls back to prior positions.
        #[arg(long)]
        market: Option<PathBuf>,

        /// Report settings (TOML). Defaults apply when omitted.
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Only include trades active on or after this date (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only include trades active on or before this date (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output directory for report.json, summary.md and tables/*.csv.
        #[arg(long, default_value = "report")]
        output_dir: PathBuf,
    },
    /// Print the default settings as TOML.
    Settings {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            input,
            market,
            settings,
            from,
            to,
            output_dir,
        } => run_report(&input, market.as_deref(), settings.as_deref(), from, to, &output_dir),
        Commands::Settings { output } => run_settings(output.as_deref()),
    }
}

fn run_report(
    input_path: &Path,
    market_path: Option<&Path>,
    settings_path: Option<&Path>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    output_dir: &Path,
) -> Result<()> {
    let mut settings = match settings_path {
        Some(path) => ReportSettings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => ReportSettings::default(),
    };
    if from.is_some() {
        settings.selection.from = from;
    }
    if to.is_some() {
        settings.selection.to = to;
    }

    let input = ReportInput::from_file(input_path)
        .with_context(|| format!("failed to load report input from {}", input_path.display()))?;
    let source = match market_path {
        Some(path) => load_market(path)?,
        None => {
            warn!("no market data given; positions will be marked from prior snapshots or fills");
            InMemoryDataSource::new()
        }
    };

    let progress = LogProgress;
    let report = ReportGenerator::new(&settings)
        .with_progress(&progress)
        .generate(&input, &source)
        .context("report generation failed")?;

    print_summary(&report);
    save_report(&report, output_dir)?;
    info!(dir = %output_dir.display(), tables = report.tables.len(), "report saved");
    println!("Report saved to: {}", output_dir.display());
    Ok(())
}

fn load_market(path: &Path) -> Result<InMemoryDataSource> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read market data {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("invalid market data in {}", path.display()))
}

fn run_settings(output: Option<&Path>) -> Result<()> {
    let toml = ReportSettings::default()
        .to_toml()
        .context("failed to serialize default settings")?;
    match output {
        Some(path) => {
            std::fs::write(path, &toml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Settings written to: {}", path.display());
        }
        None => print!("{toml}"),
    }
    Ok(())
}

fn print_summary(report: &Report) {
    println!();
    println!("=== Portfolio Report ===");
    println!("Period:     {} to {}", report.from, report.to);
    println!("Currency:   {}", report.base_currency);
    println!("Trades:     {}", report.trade_count);
    if !report.strategies.is_empty() {
        println!("Strategies: {}", report.strategies.join(", "));
    }
    println!();
    for line in &report.summary {
        println!("{:<28} {}", line.stat, line.display.as_deref().unwrap_or("n/a"));
    }
    if !report.errors.is_empty() {
        println!();
        println!("Sections with errors:");
        for e in &report.errors {
            println!("  {}: {}", e.section, e.message);
        }
    }
    println!();
}
