//! Scan command implementation with progress tracking

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use strat_scanner::scan::{scan_with_progress, CancelToken};
use strat_scanner::{data, report, Config};

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: String,
    data_dir: Option<String>,
    symbols: Option<String>,
    timeframes: Option<String>,
    min_confluence: Option<u32>,
    lookahead: Option<usize>,
    close_only: bool,
    top: Option<usize>,
    events_csv: Option<String>,
    summary_json: Option<String>,
) -> Result<()> {
    info!("Starting scan");

    // Load configuration
    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    // Apply overrides
    if let Some(dir) = data_dir {
        info!("Overriding data directory to: {}", dir);
        config.data.data_dir = dir;
    }

    if let Some(list) = symbols {
        config.data.symbols = parse_list(&list, str::to_uppercase);
        info!("Overriding symbols to: {:?}", config.data.symbols);
    }

    if let Some(list) = timeframes {
        config.data.timeframes = parse_list(&list, str::to_lowercase);
        info!("Overriding timeframes to: {:?}", config.data.timeframes);
    }

    if let Some(floor) = min_confluence {
        info!("Overriding minimum confluence to: {}", floor);
        config.scan.min_confluence = floor;
    }

    if let Some(bars) = lookahead {
        info!("Overriding lookahead to: {} bars", bars);
        config.scan.lookahead_bars = bars;
    }

    if close_only {
        info!("Overriding replay mode to close-only");
        config.scan.use_ohlc_precision = false;
    }

    if let Some(n) = top {
        config.report.top_n = n;
    }

    config.validate()?;

    // Load data
    info!("Loading data from: {}", config.data.data_dir);
    let symbols = config.data.symbols();
    let timeframes = config.timeframes()?;
    debug!("Symbols: {:?}", symbols);

    let market = data::load_market_data(&config.data.data_dir, &symbols, &timeframes)?;
    info!("Loaded {} (symbol, timeframe) units", market.unit_count());

    println!("\n{}", "=".repeat(70));
    println!("SCAN SUMMARY");
    println!("{}", "=".repeat(70));
    println!("  Symbols:          {}", symbols.len());
    println!("  Timeframes:       {}", config.data.timeframes.join(", "));
    println!("  Units loaded:     {}", market.unit_count());
    println!("  Min confluence:   {}", config.scan.min_confluence);
    println!("  Lookahead bars:   {}", config.scan.lookahead_bars);
    println!(
        "  Replay mode:      {}",
        if config.scan.use_ohlc_precision {
            "ohlc"
        } else {
            "close-only"
        }
    );
    println!("{}\n", "=".repeat(70));

    // Progress bar ticks once per completed unit
    let pb = ProgressBar::new(market.unit_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed_precise}<{eta_precise}] {msg}")
            .unwrap()
            .progress_chars("█░ "),
    );

    let cancel = CancelToken::new();
    let options = config.scan_options();
    let events = scan_with_progress(&market, &options, &cancel, || pb.inc(1));
    pb.finish_with_message(format!("{} events", events.len()));
    println!();

    info!("Detected {} reversal events", events.len());

    // Aggregate and report
    let agg_options = config.aggregate_options()?;
    let summaries = strat_scanner::aggregate::aggregate(&events, &agg_options);
    info!("{} setup groups met the sample floor", summaries.len());

    report::print_summary_table(&summaries, &agg_options.group_by, config.report.top_n);

    if let Some(path) = events_csv {
        report::write_events_csv(&path, &events, &agg_options.horizons, &config.risk)?;
        println!("Events written to {}", path);
    }

    if let Some(path) = summary_json {
        report::write_summary_json(
            &path,
            &summaries,
            &agg_options.group_by,
            &agg_options.horizons,
            &config.risk,
        )?;
        println!("Summary written to {}", path);
    }

    info!("Scan completed successfully");

    Ok(())
}

fn parse_list(raw: &str, normalize: fn(&str) -> String) -> Vec<String> {
    raw.split(',')
        .map(|s| normalize(s.trim()))
        .filter(|s| !s.is_empty())
        .collect()
}
