//! Grouped performance summaries
//!
//! Rolls simulated reversal events up into per-group statistics: win rate,
//! expectancy in R, weekly frequency, and the distribution of forward moves
//! at each horizon. Events without a simulation carry no outcome and are
//! skipped. Groups below the sample floor are dropped rather than reported
//! with unstable numbers.

use std::collections::BTreeMap;

use crate::types::{ConfigError, MovePercentiles, ReversalEvent, SetupSummary};

const SECONDS_PER_WEEK: f64 = 7.0 * 86_400.0;

/// Dimensions a summary can group on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDimension {
    Symbol,
    Timeframe,
    Pattern,
    Direction,
}

impl GroupDimension {
    pub fn name(&self) -> &'static str {
        match self {
            GroupDimension::Symbol => "symbol",
            GroupDimension::Timeframe => "timeframe",
            GroupDimension::Pattern => "pattern",
            GroupDimension::Direction => "direction",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "symbol" => Ok(GroupDimension::Symbol),
            "timeframe" => Ok(GroupDimension::Timeframe),
            "pattern" => Ok(GroupDimension::Pattern),
            "direction" => Ok(GroupDimension::Direction),
            other => Err(ConfigError::UnknownGroupDimension(other.to_string())),
        }
    }

    fn value_of(&self, event: &ReversalEvent) -> String {
        match self {
            GroupDimension::Symbol => event.symbol.to_string(),
            GroupDimension::Timeframe => event.timeframe.to_string(),
            GroupDimension::Pattern => event.pattern.to_string(),
            GroupDimension::Direction => event.direction.to_string(),
        }
    }
}

/// Aggregation parameters.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub group_by: Vec<GroupDimension>,
    pub horizons: Vec<u32>,
    /// Groups with fewer simulated events than this are dropped
    pub min_samples: usize,
    /// Denominator for frequency; None derives it from the event span
    pub lookback_weeks: Option<f64>,
}

/// Summarize events into ranked per-group statistics.
///
/// Output is ordered best expectancy first, with the group key breaking
/// ties, so identical inputs produce identical reports.
pub fn aggregate(events: &[ReversalEvent], opts: &AggregateOptions) -> Vec<SetupSummary> {
    let mut groups: BTreeMap<Vec<String>, Vec<&ReversalEvent>> = BTreeMap::new();
    for event in events {
        if event.simulation.is_none() {
            continue;
        }
        let key: Vec<String> = opts.group_by.iter().map(|d| d.value_of(event)).collect();
        groups.entry(key).or_default().push(event);
    }

    let mut rows = Vec::new();
    for (key, members) in &groups {
        if members.len() < opts.min_samples {
            continue;
        }

        let outcomes: Vec<f64> = members
            .iter()
            .filter_map(|e| e.simulation.as_ref())
            .map(|s| s.outcome_r)
            .collect();
        let sample_count = outcomes.len();
        let wins = outcomes.iter().filter(|r| **r > 0.0).count();
        let win_rate = wins as f64 / sample_count as f64;
        let expectancy_r = outcomes.iter().sum::<f64>() / sample_count as f64;
        let frequency_per_week = sample_count as f64 / effective_weeks(members, opts.lookback_weeks);

        let mut move_profile = BTreeMap::new();
        for &h in &opts.horizons {
            let mut moves: Vec<f64> = members
                .iter()
                .filter_map(|e| e.forward_move_pct.get(&h).copied())
                .collect();
            // A distribution needs at least two observations.
            if moves.len() < 2 {
                continue;
            }
            moves.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            move_profile.insert(
                h,
                MovePercentiles {
                    p25: percentile(&moves, 0.25),
                    p50: percentile(&moves, 0.50),
                    p75: percentile(&moves, 0.75),
                    p90: percentile(&moves, 0.90),
                },
            );
        }

        rows.push(SetupSummary {
            group: opts
                .group_by
                .iter()
                .map(|d| d.name().to_string())
                .zip(key.iter().cloned())
                .collect(),
            sample_count,
            frequency_per_week,
            win_rate,
            expectancy_r,
            move_profile,
        });
    }

    rows.sort_by(|a, b| {
        b.expectancy_r
            .partial_cmp(&a.expectancy_r)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.group.cmp(&b.group))
    });
    rows
}

/// Weeks to divide the sample count by. An explicit lookback wins; otherwise
/// the group's own timestamp span, floored at one week for degenerate spans.
fn effective_weeks(members: &[&ReversalEvent], lookback_weeks: Option<f64>) -> f64 {
    if let Some(weeks) = lookback_weeks {
        return weeks.max(1.0);
    }
    let first = members.iter().map(|e| e.timestamp).min();
    let last = members.iter().map(|e| e.timestamp).max();
    match (first, last) {
        (Some(first), Some(last)) if last > first => {
            ((last - first).num_seconds() as f64 / SECONDS_PER_WEEK).max(1.0)
        }
        _ => 1.0,
    }
}

/// Percentile by linear interpolation between ranked samples.
/// `sorted` must be ascending and non-empty; `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeframe::Timeframe;
    use crate::types::{
        Direction, ExitReason, Pattern, SimulationResult, Symbol,
    };
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn event(
        symbol: &str,
        timeframe: Timeframe,
        pattern: Pattern,
        day: i64,
        outcome_r: Option<f64>,
        moves: &[(u32, f64)],
    ) -> ReversalEvent {
        let direction = match pattern {
            Pattern::OutsideInsideUp | Pattern::DownInsideUp | Pattern::DownUp => {
                Direction::Bullish
            }
            _ => Direction::Bearish,
        };
        ReversalEvent {
            symbol: Symbol::new(symbol),
            timeframe,
            timestamp: ts(day),
            pattern,
            direction,
            entry_price: 100.0,
            higher_tf_trend: Some(direction.aligned_bar_type()),
            confluence_count: 3,
            simulation: outcome_r.map(|r| SimulationResult {
                outcome_r: r,
                exit_reason: ExitReason::LookaheadExhausted,
                bars_held: 5,
                scale_out_fills: vec![],
            }),
            forward_move_pct: moves.iter().copied().collect(),
        }
    }

    fn opts(group_by: Vec<GroupDimension>, min_samples: usize) -> AggregateOptions {
        AggregateOptions {
            group_by,
            horizons: vec![1, 3],
            min_samples,
            lookback_weeks: Some(52.0),
        }
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&sorted, 0.25), 1.75);
        assert_relative_eq!(percentile(&sorted, 0.50), 2.5);
        assert_relative_eq!(percentile(&sorted, 0.75), 3.25);
        assert_relative_eq!(percentile(&sorted, 0.90), 3.7);
        assert_relative_eq!(percentile(&sorted, 0.0), 1.0);
        assert_relative_eq!(percentile(&sorted, 1.0), 4.0);
        assert_relative_eq!(percentile(&[5.0], 0.9), 5.0);
    }

    #[test]
    fn test_win_rate_and_expectancy() {
        let events: Vec<ReversalEvent> = [1.0, 2.0, -1.0, 0.5]
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                event(
                    "SPY",
                    Timeframe::Daily,
                    Pattern::DownUp,
                    i as i64,
                    Some(r),
                    &[],
                )
            })
            .collect();

        let rows = aggregate(&events, &opts(vec![GroupDimension::Pattern], 1));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.sample_count, 4);
        assert_relative_eq!(row.win_rate, 0.75);
        assert_relative_eq!(row.expectancy_r, 0.625);
        assert_relative_eq!(row.frequency_per_week, 4.0 / 52.0);
        assert_eq!(row.group, vec![("pattern".to_string(), "Down-Up".to_string())]);
    }

    #[test]
    fn test_small_groups_dropped_silently() {
        let events = vec![
            event("SPY", Timeframe::Daily, Pattern::DownUp, 0, Some(1.0), &[]),
            event("SPY", Timeframe::Daily, Pattern::UpDown, 1, Some(1.0), &[]),
            event("SPY", Timeframe::Daily, Pattern::UpDown, 2, Some(-1.0), &[]),
        ];
        let rows = aggregate(&events, &opts(vec![GroupDimension::Pattern], 2));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group[0].1, "Up-Down");
    }

    #[test]
    fn test_events_without_simulation_skipped() {
        let events = vec![
            event("SPY", Timeframe::Daily, Pattern::DownUp, 0, Some(1.0), &[]),
            event("SPY", Timeframe::Daily, Pattern::DownUp, 1, None, &[]),
        ];
        let rows = aggregate(&events, &opts(vec![GroupDimension::Pattern], 1));
        assert_eq!(rows[0].sample_count, 1);
    }

    #[test]
    fn test_move_profile_per_horizon() {
        let events = vec![
            event("SPY", Timeframe::Daily, Pattern::DownUp, 0, Some(1.0), &[(1, 1.0), (3, 4.0)]),
            event("SPY", Timeframe::Daily, Pattern::DownUp, 1, Some(1.0), &[(1, 2.0), (3, 8.0)]),
            event("SPY", Timeframe::Daily, Pattern::DownUp, 2, Some(1.0), &[(1, 3.0)]),
        ];
        let rows = aggregate(&events, &opts(vec![GroupDimension::Pattern], 1));
        let profile = &rows[0].move_profile;

        let h1 = &profile[&1];
        assert_relative_eq!(h1.p50, 2.0);
        assert_relative_eq!(h1.p25, 1.5);
        assert_relative_eq!(h1.p75, 2.5);
        assert_relative_eq!(h1.p90, 2.8);

        // Horizon 3 has two observations, still enough for a distribution.
        let h3 = &profile[&3];
        assert_relative_eq!(h3.p50, 6.0);
    }

    #[test]
    fn test_horizon_with_single_observation_omitted() {
        let events = vec![
            event("SPY", Timeframe::Daily, Pattern::DownUp, 0, Some(1.0), &[(1, 1.0), (3, 4.0)]),
            event("SPY", Timeframe::Daily, Pattern::DownUp, 1, Some(1.0), &[(1, 2.0)]),
        ];
        let rows = aggregate(&events, &opts(vec![GroupDimension::Pattern], 1));
        let profile = &rows[0].move_profile;
        assert!(profile.contains_key(&1));
        assert!(!profile.contains_key(&3));
    }

    #[test]
    fn test_rows_ranked_by_expectancy_then_key() {
        let mut events = Vec::new();
        for day in 0..3 {
            events.push(event("SPY", Timeframe::Daily, Pattern::DownUp, day, Some(2.0), &[]));
            events.push(event("SPY", Timeframe::Daily, Pattern::UpDown, day, Some(-0.5), &[]));
            events.push(event("QQQ", Timeframe::Daily, Pattern::DownUp, day, Some(2.0), &[]));
        }
        let rows = aggregate(
            &events,
            &opts(vec![GroupDimension::Symbol, GroupDimension::Pattern], 1),
        );
        assert_eq!(rows.len(), 3);
        // Tied expectancy falls back to group key order: QQQ before SPY.
        assert_eq!(rows[0].group[0].1, "QQQ");
        assert_eq!(rows[1].group[0].1, "SPY");
        assert_relative_eq!(rows[2].expectancy_r, -0.5);
    }

    #[test]
    fn test_frequency_from_span_when_no_lookback() {
        // Five events across exactly four weeks.
        let events: Vec<ReversalEvent> = (0..5)
            .map(|i| {
                event(
                    "SPY",
                    Timeframe::Daily,
                    Pattern::DownUp,
                    i * 7,
                    Some(1.0),
                    &[],
                )
            })
            .collect();
        let options = AggregateOptions {
            group_by: vec![GroupDimension::Pattern],
            horizons: vec![],
            min_samples: 1,
            lookback_weeks: None,
        };
        let rows = aggregate(&events, &options);
        assert_relative_eq!(rows[0].frequency_per_week, 5.0 / 4.0);
    }

    #[test]
    fn test_degenerate_span_counts_over_one_week() {
        let events = vec![event("SPY", Timeframe::Daily, Pattern::DownUp, 0, Some(1.0), &[])];
        let options = AggregateOptions {
            group_by: vec![GroupDimension::Pattern],
            horizons: vec![],
            min_samples: 1,
            lookback_weeks: None,
        };
        let rows = aggregate(&events, &options);
        assert_relative_eq!(rows[0].frequency_per_week, 1.0);
    }

    #[test]
    fn test_empty_events_produce_empty_report() {
        let rows = aggregate(&[], &opts(vec![GroupDimension::Pattern], 1));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unknown_dimension_is_config_error() {
        let err = GroupDimension::parse("venue").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGroupDimension(_)));
    }
}
