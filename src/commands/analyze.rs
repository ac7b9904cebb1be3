//! Analyze command implementation
//!
//! Re-aggregates an events CSV produced by the scan command, so grouping
//! and ranking can be reworked without rescanning price data.

use anyhow::Result;
use tracing::info;

use strat_scanner::{report, Config};

pub fn run(
    events_path: String,
    config_path: String,
    top: Option<usize>,
    summary_json: Option<String>,
) -> Result<()> {
    info!("Analyzing events from: {}", events_path);

    // Load configuration
    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(n) = top {
        config.report.top_n = n;
    }

    config.validate()?;

    let (events, detected_horizons) = report::load_events_csv(&events_path)?;

    let mut agg_options = config.aggregate_options()?;
    // The file's own horizon columns say what can actually be measured.
    if !detected_horizons.is_empty() {
        agg_options.horizons = detected_horizons;
    }

    let summaries = strat_scanner::aggregate::aggregate(&events, &agg_options);
    info!("{} setup groups met the sample floor", summaries.len());

    report::print_summary_table(&summaries, &agg_options.group_by, config.report.top_n);

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

    info!("Analysis completed successfully");

    Ok(())
}
