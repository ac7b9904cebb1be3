//! Result export and console reporting
//!
//! Events travel as CSV so they can be re-aggregated later without
//! rescanning; ranked summaries go out as JSON for downstream tooling and
//! as a console table for humans. The CSV carries one fwd_{h}_pct column
//! per horizon, and the loader detects horizons from those headers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::aggregate::GroupDimension;
use crate::data::parse_timestamp;
use crate::sim::RiskModel;
use crate::timeframe::Timeframe;
use crate::types::{
    BarType, Direction, ExitReason, Pattern, ReversalEvent, SetupSummary, SimulationResult,
    Symbol,
};

// =============================================================================
// Events CSV
// =============================================================================

/// Write enriched events to CSV, one fwd_{h}_pct column per horizon
pub fn write_events_csv(
    path: impl AsRef<Path>,
    events: &[ReversalEvent],
    horizons: &[u32],
    risk: &RiskModel,
) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)
        .context(format!("Failed to create events CSV: {}", path.display()))?;

    let fwd_headers: String = horizons
        .iter()
        .map(|h| format!(",fwd_{}_pct", h))
        .collect();
    writeln!(
        file,
        "symbol,timeframe,timestamp,pattern,direction,entry_price,stop_price,\
         higher_tf_trend,confluence_count,outcome_r,exit_reason,bars_held{}",
        fwd_headers
    )?;

    for event in events {
        let stop_price = match event.direction {
            Direction::Bullish => event.entry_price * (1.0 - risk.stop_pct),
            Direction::Bearish => event.entry_price * (1.0 + risk.stop_pct),
        };
        let trend = event
            .higher_tf_trend
            .map(|t| t.notation().to_string())
            .unwrap_or_default();
        let (outcome_r, exit_reason, bars_held) = match &event.simulation {
            Some(sim) => (
                sim.outcome_r.to_string(),
                sim.exit_reason.to_string(),
                sim.bars_held.to_string(),
            ),
            None => (String::new(), String::new(), String::new()),
        };
        let fwd_cells: String = horizons
            .iter()
            .map(|h| match event.forward_move_pct.get(h) {
                Some(pct) => format!(",{}", pct),
                None => ",".to_string(),
            })
            .collect();

        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{}{}",
            event.symbol,
            event.timeframe,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.pattern,
            event.direction,
            event.entry_price,
            stop_price,
            trend,
            event.confluence_count,
            outcome_r,
            exit_reason,
            bars_held,
            fwd_cells
        )?;
    }

    info!("Saved {} events to {}", events.len(), path.display());
    Ok(())
}

struct EventColumns {
    symbol: usize,
    timeframe: usize,
    timestamp: usize,
    pattern: usize,
    direction: usize,
    entry_price: usize,
    higher_tf_trend: usize,
    confluence_count: usize,
    outcome_r: usize,
    exit_reason: usize,
    bars_held: usize,
}

/// Load events from a CSV written by `write_events_csv`.
///
/// Returns the events and the horizons detected from fwd_{h}_pct headers.
/// Rows that fail to parse are skipped with a warning.
pub fn load_events_csv(path: impl AsRef<Path>) -> Result<(Vec<ReversalEvent>, Vec<u32>)> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .context(format!("Failed to open events CSV: {}", path.display()))?;
    let headers = reader
        .headers()
        .context("Failed to read events CSV header")?
        .clone();

    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("Events CSV is missing column '{}'", name))
    };
    let columns = EventColumns {
        symbol: col("symbol")?,
        timeframe: col("timeframe")?,
        timestamp: col("timestamp")?,
        pattern: col("pattern")?,
        direction: col("direction")?,
        entry_price: col("entry_price")?,
        higher_tf_trend: col("higher_tf_trend")?,
        confluence_count: col("confluence_count")?,
        outcome_r: col("outcome_r")?,
        exit_reason: col("exit_reason")?,
        bars_held: col("bars_held")?,
    };

    let horizon_columns: Vec<(u32, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| {
            let h = header.strip_prefix("fwd_")?.strip_suffix("_pct")?;
            h.parse::<u32>().ok().map(|h| (h, idx))
        })
        .collect();

    let mut events = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let record = result.context("Failed to read events CSV row")?;
        match parse_event_row(&record, &columns, &horizon_columns) {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("Skipped {} unparseable rows in {}", skipped, path.display());
    }

    let mut horizons: Vec<u32> = horizon_columns.iter().map(|(h, _)| *h).collect();
    horizons.sort_unstable();

    info!("Loaded {} events from {}", events.len(), path.display());
    Ok((events, horizons))
}

fn parse_event_row(
    record: &csv::StringRecord,
    columns: &EventColumns,
    horizon_columns: &[(u32, usize)],
) -> Option<ReversalEvent> {
    let symbol = Symbol::new(record.get(columns.symbol)?);
    let timeframe: Timeframe = record.get(columns.timeframe)?.parse().ok()?;
    let timestamp = parse_timestamp(record.get(columns.timestamp)?).ok()?;
    let pattern = Pattern::from_label(record.get(columns.pattern)?)?;
    let direction = Direction::from_label(record.get(columns.direction)?)?;
    let entry_price: f64 = record.get(columns.entry_price)?.parse().ok()?;
    let confluence_count: u32 = record.get(columns.confluence_count)?.parse().ok()?;
    let higher_tf_trend = match record.get(columns.higher_tf_trend)? {
        "" => None,
        s => Some(BarType::from_notation(s)?),
    };

    let outcome_cell = record.get(columns.outcome_r)?;
    let simulation = if outcome_cell.is_empty() {
        None
    } else {
        Some(SimulationResult {
            outcome_r: outcome_cell.parse().ok()?,
            exit_reason: ExitReason::from_label(record.get(columns.exit_reason)?)?,
            bars_held: record.get(columns.bars_held)?.parse().ok()?,
            // The CSV carries outcomes, not per-unit fills.
            scale_out_fills: Vec::new(),
        })
    };

    let mut forward_move_pct = BTreeMap::new();
    for &(h, idx) in horizon_columns {
        let cell = record.get(idx)?;
        if !cell.is_empty() {
            forward_move_pct.insert(h, cell.parse().ok()?);
        }
    }

    Some(ReversalEvent {
        symbol,
        timeframe,
        timestamp,
        pattern,
        direction,
        entry_price,
        higher_tf_trend,
        confluence_count,
        simulation,
        forward_move_pct,
    })
}

// =============================================================================
// Summary JSON
// =============================================================================

#[derive(Serialize)]
struct SummaryPayload<'a> {
    generated_at: DateTime<Utc>,
    group_by: Vec<&'static str>,
    horizons: &'a [u32],
    risk: &'a RiskModel,
    setups: &'a [SetupSummary],
}

/// Write ranked summaries as pretty-printed JSON
pub fn write_summary_json(
    path: impl AsRef<Path>,
    summaries: &[SetupSummary],
    group_by: &[GroupDimension],
    horizons: &[u32],
    risk: &RiskModel,
) -> Result<()> {
    let path = path.as_ref();
    let payload = SummaryPayload {
        generated_at: Utc::now(),
        group_by: group_by.iter().map(|d| d.name()).collect(),
        horizons,
        risk,
        setups: summaries,
    };
    let json = serde_json::to_string_pretty(&payload).context("Failed to serialize summary")?;
    fs::write(path, json)
        .context(format!("Failed to write summary JSON: {}", path.display()))?;

    info!("Saved {} setup summaries to {}", summaries.len(), path.display());
    Ok(())
}

// =============================================================================
// Console output
// =============================================================================

/// Print the ranked setup table
pub fn print_summary_table(
    summaries: &[SetupSummary],
    group_by: &[GroupDimension],
    top_n: usize,
) {
    if summaries.is_empty() {
        println!("\nNo setups met the minimum sample requirement.");
        return;
    }

    let shown = top_n.min(summaries.len());
    let dims = group_by
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(" / ");

    println!("\n{}", "=".repeat(100));
    println!(
        "TOP SETUPS BY EXPECTANCY (showing {} of {} groups)",
        shown,
        summaries.len()
    );
    println!("{}", "=".repeat(100));
    println!(
        "{:<4} {:<44} {:>8} {:>10} {:>8} {:>12}",
        "Rank", dims, "Samples", "Freq/Wk", "Win%", "Expect R"
    );
    println!("{}", "-".repeat(100));

    for (rank, row) in summaries.iter().take(top_n).enumerate() {
        println!(
            "{:<4} {:<44} {:>8} {:>10.2} {:>8.1} {:>12.3}",
            rank + 1,
            row.group_label(),
            row.sample_count,
            row.frequency_per_week,
            row.win_rate * 100.0,
            row.expectancy_r
        );
    }

    println!("{}", "=".repeat(100));
}
