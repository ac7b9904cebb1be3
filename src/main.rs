//! Reversal setup scanner - main entry point
//!
//! This binary provides two subcommands:
//! - scan: Detect reversal setups and simulate their outcomes
//! - analyze: Re-aggregate a previously exported events CSV

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "strat-scanner")]
#[command(about = "Multi-timeframe reversal setup scanner with scaled-exit trade simulation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan price data for reversal setups and rank them by simulated performance
    Scan {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/scanner.json")]
        config: String,

        /// Directory of {SYMBOL}_{timeframe}.csv files (overrides config)
        #[arg(long)]
        data_dir: Option<String>,

        /// Symbols to scan (comma-separated). E.g., "SPY,QQQ,IWM"
        #[arg(long)]
        symbols: Option<String>,

        /// Timeframes to scan (comma-separated). E.g., "4hour,daily,weekly"
        #[arg(long)]
        timeframes: Option<String>,

        /// Minimum aligned coarser timeframes for an event to survive
        #[arg(long)]
        min_confluence: Option<u32>,

        /// Forward bars to replay per event
        #[arg(long)]
        lookahead: Option<usize>,

        /// Compare closes only instead of full bar ranges
        #[arg(long)]
        close_only: bool,

        /// Number of top setups to show
        #[arg(short, long)]
        top: Option<usize>,

        /// Write enriched events to this CSV file
        #[arg(long)]
        events_csv: Option<String>,

        /// Write ranked summaries to this JSON file
        #[arg(long)]
        summary_json: Option<String>,
    },

    /// Re-aggregate a previously exported events CSV
    Analyze {
        /// Path to an events CSV produced by scan
        #[arg(short, long)]
        events: String,

        /// Path to configuration file
        #[arg(short, long, default_value = "configs/scanner.json")]
        config: String,

        /// Number of top setups to show
        #[arg(short, long)]
        top: Option<usize>,

        /// Write ranked summaries to this JSON file
        #[arg(long)]
        summary_json: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // File appender
    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // For scan: only log to file, keep console clean for progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // File layer - same format but without ANSI colors
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine command name and whether to use file-only logging
    let (command_name, file_only) = match &cli.command {
        Commands::Scan { .. } => ("scan", true), // File-only for clean progress bar
        Commands::Analyze { .. } => ("analyze", false),
    };

    // Setup logging
    setup_logging(cli.verbose, command_name, file_only)?;

    // Execute command
    match cli.command {
        Commands::Scan {
            config,
            data_dir,
            symbols,
            timeframes,
            min_confluence,
            lookahead,
            close_only,
            top,
            events_csv,
            summary_json,
        } => commands::scan::run(
            config,
            data_dir,
            symbols,
            timeframes,
            min_confluence,
            lookahead,
            close_only,
            top,
            events_csv,
            summary_json,
        ),

        Commands::Analyze {
            events,
            config,
            top,
            summary_json,
        } => commands::analyze::run(events, config, top, summary_json),
    }
}
