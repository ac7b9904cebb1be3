//! Strat Scanner
//!
//! A multi-timeframe price-reversal scanner: classifies bars against their
//! predecessors, matches a fixed catalog of reversal patterns, confirms each
//! match against coarser-timeframe trend, simulates a three-unit scaled-exit
//! trade over the bars that follow, and aggregates outcomes into ranked
//! setup statistics.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod confluence;
pub mod data;
pub mod patterns;
pub mod report;
pub mod scan;
pub mod sim;
pub mod timeframe;
pub mod types;

pub use config::Config;
pub use timeframe::Timeframe;
pub use types::*;
