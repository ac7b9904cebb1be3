//! Scaled-exit trade simulation
//!
//! Replays the bars after an entry through a three-unit exit ladder:
//! unit 1 scales out at +1R, unit 2 at +2R, and the final unit trails a
//! stop behind the best close once +2R has printed. The stop is evaluated
//! before targets on every bar, so a bar wide enough to contain both
//! resolves as the stop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Direction, ExitReason, PriceBar, ScaleOutFill, SimulationResult};

/// Number of position units in the exit ladder.
pub const UNITS: usize = 3;

/// Risk model for the exit ladder. All distances are in R, where 1R is
/// `stop_pct` of the entry price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskModel {
    /// Stop distance as a fraction of entry price
    pub stop_pct: f64,
    /// Scale-out levels for units 1 and 2
    pub scale_levels_r: [f64; 2],
    /// Trailing distance behind the best close for the final unit
    pub trail_gap_r: f64,
}

impl Default for RiskModel {
    fn default() -> Self {
        Self {
            stop_pct: 0.05,
            scale_levels_r: [1.0, 2.0],
            trail_gap_r: 1.0,
        }
    }
}

/// How forward bars are replayed against price levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayMode {
    /// Test each bar's full [low, high] range
    OhlcPrecise,
    /// Compare closes only
    CloseOnly,
}

/// Replay the bars after an entry and produce the exit record.
///
/// Returns None when `forward` is empty or the entry price is unusable;
/// such events carry no outcome rather than a fabricated one.
pub fn simulate(
    direction: Direction,
    entry_price: f64,
    forward: &[PriceBar],
    risk: &RiskModel,
    mode: ReplayMode,
) -> Option<SimulationResult> {
    if forward.is_empty() || !entry_price.is_finite() || entry_price <= 0.0 {
        return None;
    }

    let r_price = entry_price * risk.stop_pct;
    let (stop_price, t1_price, t2_price) = match direction {
        Direction::Bullish => (
            entry_price - r_price,
            entry_price + risk.scale_levels_r[0] * r_price,
            entry_price + risk.scale_levels_r[1] * r_price,
        ),
        Direction::Bearish => (
            entry_price + r_price,
            entry_price - risk.scale_levels_r[0] * r_price,
            entry_price - risk.scale_levels_r[1] * r_price,
        ),
    };

    let r_of = |price: f64| match direction {
        Direction::Bullish => (price - entry_price) / r_price,
        Direction::Bearish => (entry_price - price) / r_price,
    };

    let mut fills: [Option<ScaleOutFill>; UNITS] = [None, None, None];
    // Best close since the +2R fill; Some only once the trail is live.
    let mut peak_close: Option<f64> = None;

    for (i, bar) in forward.iter().enumerate() {
        let bars_after_entry = i + 1;
        let (reach_down, reach_up) = match mode {
            ReplayMode::OhlcPrecise => (bar.low, bar.high),
            ReplayMode::CloseOnly => (bar.close, bar.close),
        };
        let adverse_reach = match direction {
            Direction::Bullish => reach_down,
            Direction::Bearish => reach_up,
        };
        let favorable_reach = match direction {
            Direction::Bullish => reach_up,
            Direction::Bearish => reach_down,
        };
        let adverse_hit = |level: f64| match direction {
            Direction::Bullish => adverse_reach <= level,
            Direction::Bearish => adverse_reach >= level,
        };
        let favorable_hit = |level: f64| match direction {
            Direction::Bullish => favorable_reach >= level,
            Direction::Bearish => favorable_reach <= level,
        };

        // Hard stop first: intrabar order is unknown, the worst case wins.
        if adverse_hit(stop_price) {
            for (unit, slot) in fills.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = Some(ScaleOutFill {
                        unit: unit + 1,
                        bars_after_entry,
                        price_level: stop_price,
                        r_multiple: -1.0,
                    });
                }
            }
            return Some(finish(fills, ExitReason::FullStop, bars_after_entry));
        }

        // Scale-out targets fill at their level, not at the bar extreme.
        if fills[0].is_none() && favorable_hit(t1_price) {
            fills[0] = Some(ScaleOutFill {
                unit: 1,
                bars_after_entry,
                price_level: t1_price,
                r_multiple: risk.scale_levels_r[0],
            });
        }
        if fills[1].is_none() && favorable_hit(t2_price) {
            fills[1] = Some(ScaleOutFill {
                unit: 2,
                bars_after_entry,
                price_level: t2_price,
                r_multiple: risk.scale_levels_r[1],
            });
            peak_close = Some(bar.close);
        }

        // Trailing exit for the final unit.
        if let Some(peak) = peak_close.as_mut() {
            if fills[2].is_none() {
                *peak = match direction {
                    Direction::Bullish => peak.max(bar.close),
                    Direction::Bearish => peak.min(bar.close),
                };
                let trail_price = match direction {
                    Direction::Bullish => *peak - risk.trail_gap_r * r_price,
                    Direction::Bearish => *peak + risk.trail_gap_r * r_price,
                };
                if adverse_hit(trail_price) {
                    fills[2] = Some(ScaleOutFill {
                        unit: 3,
                        bars_after_entry,
                        price_level: trail_price,
                        r_multiple: r_of(trail_price),
                    });
                    return Some(finish(fills, ExitReason::TrailingStop, bars_after_entry));
                }
            }
        }
    }

    // Window exhausted: mark any open units to the last close.
    let last_close = forward[forward.len() - 1].close;
    for (unit, slot) in fills.iter_mut().enumerate() {
        if slot.is_none() {
            *slot = Some(ScaleOutFill {
                unit: unit + 1,
                bars_after_entry: forward.len(),
                price_level: last_close,
                r_multiple: r_of(last_close),
            });
        }
    }
    Some(finish(fills, ExitReason::LookaheadExhausted, forward.len()))
}

fn finish(
    fills: [Option<ScaleOutFill>; UNITS],
    exit_reason: ExitReason,
    bars_held: usize,
) -> SimulationResult {
    let scale_out_fills: Vec<ScaleOutFill> = fills.into_iter().flatten().collect();
    let outcome_r = scale_out_fills.iter().map(|f| f.r_multiple).sum::<f64>()
        / scale_out_fills.len() as f64;
    SimulationResult {
        outcome_r,
        exit_reason,
        bars_held,
        scale_out_fills,
    }
}

/// Signed % move of the close `h` bars after entry, for every horizon the
/// forward window can answer. Horizons past the window are omitted.
pub fn forward_moves(
    entry_price: f64,
    forward: &[PriceBar],
    horizons: &[u32],
) -> BTreeMap<u32, f64> {
    let mut moves = BTreeMap::new();
    if entry_price <= 0.0 {
        return moves;
    }
    for &h in horizons {
        if h == 0 {
            continue;
        }
        if let Some(bar) = forward.get(h as usize - 1) {
            moves.insert(h, (bar.close - entry_price) / entry_price * 100.0);
        }
    }
    moves
}
