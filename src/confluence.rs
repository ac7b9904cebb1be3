//! Cross-timeframe confluence checks
//!
//! A reversal on one timeframe is confirmed by each coarser timeframe whose
//! bar covering the event trends the same way: an Up bar for a bullish
//! pattern, a Down bar for a bearish one. Coarser series with no bar at or
//! before the event simply contribute nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::timeframe::Timeframe;
use crate::types::{BarType, ClassifiedBar, Direction};

/// The classified bar covering `ts`: the last bar opening at or before it.
///
/// The series must be timestamp-ordered. The final bar covers everything
/// from its open onward.
pub fn covering_bar(series: &[ClassifiedBar], ts: DateTime<Utc>) -> Option<&ClassifiedBar> {
    let idx = series.partition_point(|c| c.timestamp() <= ts);
    idx.checked_sub(1).map(|i| &series[i])
}

/// Count coarser timeframes aligned with `direction` at `timestamp`.
///
/// Returns the count and the bar type of the finest aligned coarser
/// timeframe (the higher-timeframe trend), or None when nothing aligns.
pub fn confluence_count(
    direction: Direction,
    timestamp: DateTime<Utc>,
    timeframe: Timeframe,
    series_by_tf: &BTreeMap<Timeframe, Vec<ClassifiedBar>>,
) -> (u32, Option<BarType>) {
    let wanted = direction.aligned_bar_type();
    let mut count = 0;
    let mut first_aligned = None;

    for tf in timeframe.coarser() {
        let series = match series_by_tf.get(&tf) {
            Some(series) => series,
            None => continue,
        };
        let covering = match covering_bar(series, timestamp) {
            Some(covering) => covering,
            None => continue,
        };
        if covering.bar_type == wanted {
            count += 1;
            if first_aligned.is_none() {
                first_aligned = Some(covering.bar_type);
            }
        }
    }

    (count, first_aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceBar;
    use chrono::{Duration, TimeZone};

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn classified(day: i64, bar_type: BarType) -> ClassifiedBar {
        ClassifiedBar {
            bar: PriceBar::new_unchecked(ts(day), 100.0, 101.0, 99.0, 100.0, 1_000.0),
            bar_type,
        }
    }

    #[test]
    fn test_covering_bar_picks_last_open_at_or_before() {
        let series = vec![
            classified(0, BarType::Up),
            classified(7, BarType::Down),
            classified(14, BarType::Up),
        ];
        // Mid-interval falls back to the bar that opened before it.
        let covering = covering_bar(&series, ts(10)).unwrap();
        assert_eq!(covering.timestamp(), ts(7));
        // Exact open time is covered by that same bar.
        let covering = covering_bar(&series, ts(7)).unwrap();
        assert_eq!(covering.timestamp(), ts(7));
        // The final bar covers everything after its open.
        let covering = covering_bar(&series, ts(100)).unwrap();
        assert_eq!(covering.timestamp(), ts(14));
    }

    #[test]
    fn test_covering_bar_none_before_first_open() {
        let series = vec![classified(5, BarType::Up)];
        assert!(covering_bar(&series, ts(4)).is_none());
        assert!(covering_bar(&[], ts(4)).is_none());
    }

    #[test]
    fn test_confluence_counts_aligned_coarser_timeframes() {
        let mut by_tf = BTreeMap::new();
        by_tf.insert(Timeframe::Daily, vec![classified(9, BarType::Up)]);
        by_tf.insert(Timeframe::Weekly, vec![classified(7, BarType::Up)]);
        by_tf.insert(Timeframe::Monthly, vec![classified(0, BarType::Down)]);

        let (count, trend) =
            confluence_count(Direction::Bullish, ts(10), Timeframe::H4, &by_tf);
        assert_eq!(count, 2);
        assert_eq!(trend, Some(BarType::Up));

        // The same snapshot rejects a bearish pattern except on the monthly.
        let (count, trend) =
            confluence_count(Direction::Bearish, ts(10), Timeframe::H4, &by_tf);
        assert_eq!(count, 1);
        assert_eq!(trend, Some(BarType::Down));
    }

    #[test]
    fn test_own_and_finer_timeframes_ignored() {
        let mut by_tf = BTreeMap::new();
        by_tf.insert(Timeframe::M30, vec![classified(9, BarType::Up)]);
        by_tf.insert(Timeframe::Daily, vec![classified(9, BarType::Up)]);

        let (count, _) = confluence_count(Direction::Bullish, ts(10), Timeframe::Daily, &by_tf);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_missing_coverage_contributes_zero() {
        let mut by_tf = BTreeMap::new();
        // Weekly has no bar before the event; monthly is absent entirely.
        by_tf.insert(Timeframe::Weekly, vec![classified(20, BarType::Up)]);

        let (count, trend) =
            confluence_count(Direction::Bullish, ts(10), Timeframe::Daily, &by_tf);
        assert_eq!(count, 0);
        assert_eq!(trend, None);
    }

    #[test]
    fn test_inside_and_outside_coarser_bars_do_not_align() {
        let mut by_tf = BTreeMap::new();
        by_tf.insert(Timeframe::Weekly, vec![classified(7, BarType::Inside)]);
        by_tf.insert(Timeframe::Monthly, vec![classified(0, BarType::Outside)]);

        let (count, trend) =
            confluence_count(Direction::Bullish, ts(10), Timeframe::Daily, &by_tf);
        assert_eq!(count, 0);
        assert_eq!(trend, None);
    }

    #[test]
    fn test_trend_is_finest_aligned_timeframe() {
        let mut by_tf = BTreeMap::new();
        by_tf.insert(Timeframe::Weekly, vec![classified(7, BarType::Down)]);
        by_tf.insert(Timeframe::Monthly, vec![classified(0, BarType::Down)]);

        let (count, trend) =
            confluence_count(Direction::Bearish, ts(10), Timeframe::Daily, &by_tf);
        assert_eq!(count, 2);
        // Weekly is finer than monthly, so it defines the reported trend.
        assert_eq!(trend, Some(BarType::Down));
    }

    #[test]
    fn test_count_grows_only_with_aligned_series() {
        let mut by_tf = BTreeMap::new();
        by_tf.insert(Timeframe::Daily, vec![classified(9, BarType::Up)]);
        let (count, _) = confluence_count(Direction::Bullish, ts(10), Timeframe::H4, &by_tf);
        assert_eq!(count, 1);

        // An aligned weekly raises the count by one.
        by_tf.insert(Timeframe::Weekly, vec![classified(7, BarType::Up)]);
        let (count, _) = confluence_count(Direction::Bullish, ts(10), Timeframe::H4, &by_tf);
        assert_eq!(count, 2);

        // A misaligned monthly leaves it untouched.
        by_tf.insert(Timeframe::Monthly, vec![classified(0, BarType::Down)]);
        let (count, _) = confluence_count(Direction::Bullish, ts(10), Timeframe::H4, &by_tf);
        assert_eq!(count, 2);
    }
}
