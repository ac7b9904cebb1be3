//! Bar classification against the preceding bar
//!
//! A bar is typed by which bounds of its predecessor it broke: both
//! (Outside), the high only (Up), the low only (Down), or neither (Inside).
//! Equality on a bound does not count as a break, so a bar matching the
//! prior range exactly is Inside.

use crate::types::{BarType, ClassifiedBar, PriceBar};

/// Classify a bar against its predecessor.
pub fn classify(bar: &PriceBar, prev: &PriceBar) -> BarType {
    let broke_high = bar.high > prev.high;
    let broke_low = bar.low < prev.low;
    match (broke_high, broke_low) {
        (true, true) => BarType::Outside,
        (true, false) => BarType::Up,
        (false, true) => BarType::Down,
        (false, false) => BarType::Inside,
    }
}

/// Classify a timestamp-ordered series.
///
/// The first bar has no predecessor and is excluded, so the output has one
/// entry fewer than the input; empty and single-bar series classify to empty.
pub fn classify_series(bars: &[PriceBar]) -> Vec<ClassifiedBar> {
    bars.windows(2)
        .map(|pair| ClassifiedBar {
            bar_type: classify(&pair[1], &pair[0]),
            bar: pair[1].clone(),
        })
        .collect()
}
