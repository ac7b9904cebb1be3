//! Parallel batch scanning
//!
//! A scan unit is one (symbol, timeframe) pair: detect reversals, check
//! confluence, replay each survivor through the simulator. Units share no
//! mutable state, run across threads via rayon, and their outputs merge
//! only after every unit has finished, so a batch is all-or-nothing per
//! unit and deterministic across runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use itertools::iproduct;
use rayon::prelude::*;
use tracing::debug;

use crate::classify::classify_series;
use crate::confluence::confluence_count;
use crate::data::MarketData;
use crate::patterns::iter_reversals;
use crate::sim::{forward_moves, simulate, ReplayMode, RiskModel};
use crate::timeframe::Timeframe;
use crate::types::{ClassifiedBar, PriceBar, ReversalEvent, Symbol};

/// Scan-wide parameters.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Events with fewer aligned coarser timeframes are discarded
    pub min_confluence: u32,
    /// Forward bars replayed per event
    pub lookahead_bars: usize,
    /// Horizons (in bars) for forward move measurement
    pub horizons: Vec<u32>,
    pub risk: RiskModel,
    pub mode: ReplayMode,
}

/// Cooperative cancellation shared between the caller and scan units.
/// Checked between units, not mid-unit, so no unit emits partial output.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
struct ScanUnit {
    symbol: Symbol,
    timeframe: Timeframe,
}

/// Scan every loaded (symbol, timeframe) unit.
pub fn scan(data: &MarketData, options: &ScanOptions, cancel: &CancelToken) -> Vec<ReversalEvent> {
    scan_with_progress(data, options, cancel, || {})
}

/// Scan with a per-unit progress callback (e.g. a progress bar tick).
pub fn scan_with_progress<F>(
    data: &MarketData,
    options: &ScanOptions,
    cancel: &CancelToken,
    progress: F,
) -> Vec<ReversalEvent>
where
    F: Fn() + Sync,
{
    let symbols = data.symbols();
    let units: Vec<ScanUnit> = iproduct!(symbols.iter(), Timeframe::ALL.iter())
        .filter(|(symbol, tf)| data.series(symbol, **tf).is_some())
        .map(|(symbol, tf)| ScanUnit {
            symbol: symbol.clone(),
            timeframe: *tf,
        })
        .collect();

    // Classify every series once; units borrow the shared result.
    let mut classified: HashMap<Symbol, BTreeMap<Timeframe, Vec<ClassifiedBar>>> = HashMap::new();
    for unit in &units {
        if let Some(bars) = data.series(&unit.symbol, unit.timeframe) {
            classified
                .entry(unit.symbol.clone())
                .or_default()
                .insert(unit.timeframe, classify_series(bars));
        }
    }

    let per_unit: Vec<Vec<ReversalEvent>> = units
        .par_iter()
        .filter_map(|unit| {
            if cancel.is_cancelled() {
                return None;
            }
            let events = run_unit(unit, &classified, options);
            progress();
            events
        })
        .collect();

    let mut events: Vec<ReversalEvent> = per_unit.into_iter().flatten().collect();
    events.sort_by(|a, b| {
        a.symbol
            .as_str()
            .cmp(b.symbol.as_str())
            .then_with(|| a.timeframe.cmp(&b.timeframe))
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    events
}

fn run_unit(
    unit: &ScanUnit,
    classified: &HashMap<Symbol, BTreeMap<Timeframe, Vec<ClassifiedBar>>>,
    options: &ScanOptions,
) -> Option<Vec<ReversalEvent>> {
    let by_tf = classified.get(&unit.symbol)?;
    let series = by_tf.get(&unit.timeframe)?;

    let mut events = Vec::new();
    for mut event in iter_reversals(&unit.symbol, unit.timeframe, series) {
        let (count, trend) =
            confluence_count(event.direction, event.timestamp, unit.timeframe, by_tf);
        if count < options.min_confluence {
            continue;
        }
        event.confluence_count = count;
        event.higher_tf_trend = trend;

        // Forward window starts at the bar after the pattern's final bar.
        let start = series.partition_point(|c| c.timestamp() <= event.timestamp);
        let end = (start + options.lookahead_bars).min(series.len());
        let forward: Vec<PriceBar> = series[start..end].iter().map(|c| c.bar.clone()).collect();

        event.simulation = simulate(
            event.direction,
            event.entry_price,
            &forward,
            &options.risk,
            options.mode,
        );
        event.forward_move_pct = forward_moves(event.entry_price, &forward, &options.horizons);
        events.push(event);
    }

    debug!(
        "[{}|{}] {} reversal events",
        unit.symbol,
        unit.timeframe,
        events.len()
    );
    Some(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Pattern};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn bar(day: i64, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar::new_unchecked(ts(day), open, high, low, close, 1_000.0)
    }

    /// Daily series classifying to [Down, Up] at bars 1..2, followed by a
    /// drift higher so the simulation has forward bars to chew on.
    fn down_up_series() -> Vec<PriceBar> {
        vec![
            bar(0, 100.0, 110.0, 100.0, 105.0),
            bar(1, 104.0, 109.0, 98.0, 99.0),   // Down
            bar(2, 99.0, 112.0, 98.5, 111.0),   // Up -> Down-Up fires here
            bar(3, 111.0, 118.0, 110.0, 117.0),
            bar(4, 117.0, 124.0, 116.0, 123.0),
            bar(5, 123.0, 130.0, 122.0, 129.0),
        ]
    }

    /// Weekly bars whose covering bar at day 2 is an Up bar.
    fn weekly_up_series() -> Vec<PriceBar> {
        vec![
            bar(-14, 100.0, 110.0, 95.0, 105.0),
            bar(-7, 105.0, 115.0, 100.0, 112.0), // Up
            bar(0, 112.0, 125.0, 105.0, 120.0),  // Up, covers the event
        ]
    }

    fn options(min_confluence: u32) -> ScanOptions {
        ScanOptions {
            min_confluence,
            lookahead_bars: 3,
            horizons: vec![1, 2],
            risk: RiskModel::default(),
            mode: ReplayMode::OhlcPrecise,
        }
    }

    fn market() -> MarketData {
        let mut data = MarketData::new();
        data.insert(Symbol::new("SPY"), Timeframe::Daily, down_up_series());
        data.insert(Symbol::new("SPY"), Timeframe::Weekly, weekly_up_series());
        data
    }

    #[test]
    fn test_scan_detects_and_enriches_event() {
        let events = scan(&market(), &options(1), &CancelToken::new());
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.symbol.as_str(), "SPY");
        assert_eq!(event.timeframe, Timeframe::Daily);
        assert_eq!(event.pattern, Pattern::DownUp);
        assert_eq!(event.direction, Direction::Bullish);
        assert_eq!(event.timestamp, ts(2));
        assert_eq!(event.entry_price, 111.0);
        assert_eq!(event.confluence_count, 1);
        assert!(event.simulation.is_some());
        assert_eq!(event.forward_move_pct.len(), 2);
    }

    #[test]
    fn test_min_confluence_filters_before_simulation() {
        // Only the weekly aligns, so a floor of 2 drops the event.
        let events = scan(&market(), &options(2), &CancelToken::new());
        assert!(events.is_empty());
    }

    #[test]
    fn test_cancelled_scan_returns_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let events = scan(&market(), &options(1), &cancel);
        assert!(events.is_empty());
    }

    #[test]
    fn test_sparse_unit_does_not_disturb_siblings() {
        let mut data = market();
        // Two bars classify to a single bar: no window, no events, no panic.
        data.insert(
            Symbol::new("QQQ"),
            Timeframe::Daily,
            vec![bar(0, 100.0, 110.0, 100.0, 105.0), bar(1, 104.0, 112.0, 103.0, 111.0)],
        );
        let events = scan(&data, &options(1), &CancelToken::new());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol.as_str(), "SPY");
    }

    #[test]
    fn test_scan_output_order_is_deterministic() {
        let mut data = market();
        data.insert(Symbol::new("AAPL"), Timeframe::Daily, down_up_series());
        data.insert(Symbol::new("AAPL"), Timeframe::Weekly, weekly_up_series());

        let first = scan(&data, &options(1), &CancelToken::new());
        let second = scan(&data, &options(1), &CancelToken::new());
        assert_eq!(first, second);
        assert_eq!(first[0].symbol.as_str(), "AAPL");
        assert_eq!(first[1].symbol.as_str(), "SPY");
    }

    #[test]
    fn test_progress_called_per_unit() {
        use std::sync::atomic::AtomicUsize;

        let data = market();
        let ticks = AtomicUsize::new(0);
        scan_with_progress(&data, &options(1), &CancelToken::new(), || {
            ticks.fetch_add(1, Ordering::Relaxed);
        });
        // SPY daily + SPY weekly.
        assert_eq!(ticks.load(Ordering::Relaxed), 2);
    }
}
