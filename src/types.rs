//! Core data types for the reversal scanner

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeframe::Timeframe;

/// Validation errors for price bar data
#[derive(Debug, Error)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighBelowLow { high: f64, low: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),
}

/// Configuration-contract violations. Bad input data degrades with a
/// warning; these are the only failures the engine reports as errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown timeframe '{0}' (expected one of: 30min, 1hour, 2hour, 4hour, daily, weekly, monthly)")]
    UnknownTimeframe(String),

    #[error("unknown group-by dimension '{0}' (expected one of: symbol, timeframe, pattern, direction)")]
    UnknownGroupDimension(String),

    #[error("stop_pct must be positive, got {0}")]
    NonPositiveStop(f64),

    #[error("scale_levels_r must be positive and ascending, got [{0}, {1}]")]
    InvalidScaleLevels(f64, f64),

    #[error("trail_gap_r must be positive, got {0}")]
    NonPositiveTrailGap(f64),

    #[error("horizons must not be empty")]
    EmptyHorizons,
}

/// OHLCV price bar. The timestamp is the bar's open time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Create a new bar with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (use only for trusted data)
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate bar invariants
    pub fn validate(&self) -> Result<(), BarValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        if self.high < self.low {
            return Err(BarValidationError::HighBelowLow {
                high: self.high,
                low: self.low,
            });
        }
        if self.volume < 0.0 {
            return Err(BarValidationError::NegativeVolume(self.volume));
        }
        Ok(())
    }

    /// Check if bar data is valid
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Bar classification relative to the immediately preceding bar.
///
/// `Display` uses Strat notation (1, 2u, 2d, 3), which is what logs and
/// report columns show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarType {
    /// Neither bound of the prior bar broken
    Inside,
    /// Broke the prior high only
    Up,
    /// Broke the prior low only
    Down,
    /// Broke both prior bounds
    Outside,
}

impl BarType {
    pub fn notation(&self) -> &'static str {
        match self {
            BarType::Inside => "1",
            BarType::Up => "2u",
            BarType::Down => "2d",
            BarType::Outside => "3",
        }
    }

    pub fn from_notation(s: &str) -> Option<BarType> {
        match s {
            "1" => Some(BarType::Inside),
            "2u" => Some(BarType::Up),
            "2d" => Some(BarType::Down),
            "3" => Some(BarType::Outside),
            _ => None,
        }
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.notation())
    }
}

/// A price bar paired with its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedBar {
    pub bar: PriceBar,
    pub bar_type: BarType,
}

impl ClassifiedBar {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.bar.timestamp
    }
}

/// Trade direction implied by a reversal pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    /// The coarser-timeframe bar type that counts as aligned
    pub fn aligned_bar_type(&self) -> BarType {
        match self {
            Direction::Bullish => BarType::Up,
            Direction::Bearish => BarType::Down,
        }
    }

    pub fn from_label(s: &str) -> Option<Direction> {
        match s {
            "Bullish" => Some(Direction::Bullish),
            "Bearish" => Some(Direction::Bearish),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "Bullish"),
            Direction::Bearish => write!(f, "Bearish"),
        }
    }
}

/// The six reversal patterns the scanner recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pattern {
    OutsideInsideUp,
    OutsideInsideDown,
    UpInsideDown,
    DownInsideUp,
    UpDown,
    DownUp,
}

impl Pattern {
    /// Canonical label used in reports and group keys
    pub fn label(&self) -> &'static str {
        match self {
            Pattern::OutsideInsideUp => "Outside-Inside-Up",
            Pattern::OutsideInsideDown => "Outside-Inside-Down",
            Pattern::UpInsideDown => "Up-Inside-Down",
            Pattern::DownInsideUp => "Down-Inside-Up",
            Pattern::UpDown => "Up-Down",
            Pattern::DownUp => "Down-Up",
        }
    }

    /// Strat shorthand, e.g. "3-1-2u"
    pub fn notation(&self) -> &'static str {
        match self {
            Pattern::OutsideInsideUp => "3-1-2u",
            Pattern::OutsideInsideDown => "3-1-2d",
            Pattern::UpInsideDown => "2u-1-2d",
            Pattern::DownInsideUp => "2d-1-2u",
            Pattern::UpDown => "2u-2d",
            Pattern::DownUp => "2d-2u",
        }
    }

    pub fn from_label(s: &str) -> Option<Pattern> {
        match s {
            "Outside-Inside-Up" => Some(Pattern::OutsideInsideUp),
            "Outside-Inside-Down" => Some(Pattern::OutsideInsideDown),
            "Up-Inside-Down" => Some(Pattern::UpInsideDown),
            "Down-Inside-Up" => Some(Pattern::DownInsideUp),
            "Up-Down" => Some(Pattern::UpDown),
            "Down-Up" => Some(Pattern::DownUp),
            _ => None,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How a simulated position finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Initial stop hit with units still open
    FullStop,
    /// Final unit exited on its trailing stop
    TrailingStop,
    /// Forward window ended; open units marked to the last close
    LookaheadExhausted,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::FullStop => "full_stop",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::LookaheadExhausted => "lookahead_exhausted",
        }
    }

    pub fn from_label(s: &str) -> Option<ExitReason> {
        match s {
            "full_stop" => Some(ExitReason::FullStop),
            "trailing_stop" => Some(ExitReason::TrailingStop),
            "lookahead_exhausted" => Some(ExitReason::LookaheadExhausted),
            _ => None,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One position unit's exit fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleOutFill {
    /// Unit number, 1-based
    pub unit: usize,
    /// Forward bars elapsed at the fill, 1-based
    pub bars_after_entry: usize,
    /// Price the unit exited at
    pub price_level: f64,
    /// Signed R-multiple realized by this unit
    pub r_multiple: f64,
}

/// Outcome of replaying one reversal through the scaled-exit model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Mean R-multiple across all units
    pub outcome_r: f64,
    pub exit_reason: ExitReason,
    /// Forward bars consumed before the position fully closed
    pub bars_held: usize,
    pub scale_out_fills: Vec<ScaleOutFill>,
}

/// A detected reversal, enriched with confluence and simulation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalEvent {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    /// Open time of the pattern's final bar
    pub timestamp: DateTime<Utc>,
    pub pattern: Pattern,
    pub direction: Direction,
    /// Close of the pattern's final bar
    pub entry_price: f64,
    /// Bar type of the finest aligned coarser timeframe, if any
    pub higher_tf_trend: Option<BarType>,
    /// Number of coarser timeframes trending with the pattern
    pub confluence_count: u32,
    /// None when no forward bars exist after the entry
    pub simulation: Option<SimulationResult>,
    /// Signed % move from entry at each horizon with enough forward data
    pub forward_move_pct: BTreeMap<u32, f64>,
}

/// Quartiles and the 90th percentile of forward moves at one horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovePercentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Aggregated performance for one group of reversal events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupSummary {
    /// (dimension name, value) pairs in the configured group-by order
    pub group: Vec<(String, String)>,
    pub sample_count: usize,
    pub frequency_per_week: f64,
    /// Fraction of events with a positive outcome R
    pub win_rate: f64,
    /// Mean outcome R across the group
    pub expectancy_r: f64,
    /// Percentiles of forward moves, keyed by horizon
    pub move_profile: BTreeMap<u32, MovePercentiles>,
}

impl SetupSummary {
    /// Group values joined for display, e.g. "daily / Outside-Inside-Up"
    pub fn group_label(&self) -> String {
        self.group
            .iter()
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Trading symbol (e.g., "SPY", "QQQ").
/// Uses Arc<str> internally since symbols are cloned into every event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] Arc<str>);

/// Serde support for Arc<str>
mod arc_str_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(Arc::from(symbol.into().as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
