//! Data loading and validation
//!
//! Loads OHLCV series from a directory of {SYMBOL}_{timeframe}.csv files.
//! Malformed rows and bars never abort a load: they are dropped with a
//! warning and the surviving series keeps scanning.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

use crate::timeframe::Timeframe;
use crate::types::{PriceBar, Symbol};

// =============================================================================
// Market data container
// =============================================================================

/// Fully-materialized input series, keyed by symbol and timeframe.
/// Loaded once up front; the scan only ever borrows it.
#[derive(Debug, Default)]
pub struct MarketData {
    series: HashMap<Symbol, BTreeMap<Timeframe, Vec<PriceBar>>>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol, timeframe: Timeframe, bars: Vec<PriceBar>) {
        self.series.entry(symbol).or_default().insert(timeframe, bars);
    }

    pub fn series(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&[PriceBar]> {
        self.series
            .get(symbol)
            .and_then(|by_tf| by_tf.get(&timeframe))
            .map(|bars| bars.as_slice())
    }

    /// Loaded symbols in alphabetical order
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.series.keys().cloned().collect();
        symbols.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        symbols
    }

    /// Loaded timeframes for one symbol, finest first
    pub fn timeframes(&self, symbol: &Symbol) -> Vec<Timeframe> {
        self.series
            .get(symbol)
            .map(|by_tf| by_tf.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of (symbol, timeframe) units loaded
    pub fn unit_count(&self) -> usize {
        self.series.values().map(|by_tf| by_tf.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

// =============================================================================
// CSV loading
// =============================================================================

/// Parse a timestamp, accepting RFC 3339 or a bare "%Y-%m-%d %H:%M:%S"
/// (assumed UTC)
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .context(format!("Failed to parse timestamp: {}", s))
}

/// Load one OHLCV CSV (header: timestamp,open,high,low,close,volume)
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<PriceBar>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let ts_str = record.get(0).context("Missing timestamp column")?;
        let timestamp = parse_timestamp(ts_str)?;

        let open: f64 = record
            .get(1)
            .context("Missing open column")?
            .parse()
            .context("Failed to parse open")?;
        let high: f64 = record
            .get(2)
            .context("Missing high column")?
            .parse()
            .context("Failed to parse high")?;
        let low: f64 = record
            .get(3)
            .context("Missing low column")?
            .parse()
            .context("Failed to parse low")?;
        let close: f64 = record
            .get(4)
            .context("Missing close column")?
            .parse()
            .context("Failed to parse close")?;
        let volume: f64 = record
            .get(5)
            .context("Missing volume column")?
            .parse()
            .context("Failed to parse volume")?;

        bars.push(PriceBar::new_unchecked(
            timestamp, open, high, low, close, volume,
        ));
    }

    Ok(bars)
}

/// Drop malformed bars and out-of-order timestamps, keeping the rest
pub fn sanitize_series(bars: Vec<PriceBar>, symbol: &Symbol, timeframe: Timeframe) -> Vec<PriceBar> {
    let mut kept: Vec<PriceBar> = Vec::with_capacity(bars.len());
    let mut dropped_invalid = 0usize;
    let mut dropped_unordered = 0usize;

    for bar in bars {
        if bar.validate().is_err() {
            dropped_invalid += 1;
            continue;
        }
        if let Some(last) = kept.last() {
            if bar.timestamp <= last.timestamp {
                dropped_unordered += 1;
                continue;
            }
        }
        kept.push(bar);
    }

    if dropped_invalid > 0 {
        warn!(
            "[{}|{}] Dropped {} malformed bars",
            symbol, timeframe, dropped_invalid
        );
    }
    if dropped_unordered > 0 {
        warn!(
            "[{}|{}] Dropped {} out-of-order bars",
            symbol, timeframe, dropped_unordered
        );
    }

    kept
}

/// Load every requested (symbol, timeframe) series from a data directory.
///
/// Missing or unreadable files are skipped with a warning; only an entirely
/// empty result is an error.
pub fn load_market_data(
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
    timeframes: &[Timeframe],
) -> Result<MarketData> {
    let mut data = MarketData::new();

    for symbol in symbols {
        for &timeframe in timeframes {
            let filename = format!("{}_{}.csv", symbol.as_str(), timeframe);
            let path = data_dir.as_ref().join(&filename);

            if !path.exists() {
                warn!("Data file not found: {}", path.display());
                continue;
            }

            let bars = match load_csv(&path) {
                Ok(bars) => bars,
                Err(e) => {
                    warn!("Skipping unreadable file {}: {:#}", path.display(), e);
                    continue;
                }
            };

            let bars = sanitize_series(bars, symbol, timeframe);
            if bars.is_empty() {
                warn!("[{}|{}] No usable bars, skipping", symbol, timeframe);
                continue;
            }

            info!("Loaded {} bars for {} {}", bars.len(), symbol, timeframe);
            data.insert(symbol.clone(), timeframe, bars);
        }
    }

    if data.is_empty() {
        bail!("No data loaded for any symbol/timeframe");
    }

    Ok(data)
}
