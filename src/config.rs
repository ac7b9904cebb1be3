//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files. Every section
//! has defaults, so a partial file still yields a working scanner;
//! `validate` catches contract violations before any work starts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::aggregate::{AggregateOptions, GroupDimension};
use crate::scan::ScanOptions;
use crate::sim::{ReplayMode, RiskModel};
use crate::timeframe::Timeframe;
use crate::types::{ConfigError, Symbol};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub risk: RiskModel,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    /// Check the configuration contract before running anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeframes()?;
        self.group_by()?;
        if self.risk.stop_pct <= 0.0 {
            return Err(ConfigError::NonPositiveStop(self.risk.stop_pct));
        }
        let [first, second] = self.risk.scale_levels_r;
        if first <= 0.0 || second <= first {
            return Err(ConfigError::InvalidScaleLevels(first, second));
        }
        if self.risk.trail_gap_r <= 0.0 {
            return Err(ConfigError::NonPositiveTrailGap(self.risk.trail_gap_r));
        }
        if self.report.horizons.is_empty() {
            return Err(ConfigError::EmptyHorizons);
        }
        Ok(())
    }

    /// Parsed timeframe list
    pub fn timeframes(&self) -> Result<Vec<Timeframe>, ConfigError> {
        self.data.timeframes.iter().map(|s| s.parse()).collect()
    }

    /// Parsed group-by dimensions
    pub fn group_by(&self) -> Result<Vec<GroupDimension>, ConfigError> {
        self.report
            .group_by
            .iter()
            .map(|s| GroupDimension::parse(s))
            .collect()
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            min_confluence: self.scan.min_confluence,
            lookahead_bars: self.scan.lookahead_bars,
            horizons: self.report.horizons.clone(),
            risk: self.risk,
            mode: if self.scan.use_ohlc_precision {
                ReplayMode::OhlcPrecise
            } else {
                ReplayMode::CloseOnly
            },
        }
    }

    pub fn aggregate_options(&self) -> Result<AggregateOptions, ConfigError> {
        Ok(AggregateOptions {
            group_by: self.group_by()?,
            horizons: self.report.horizons.clone(),
            min_samples: self.report.min_samples,
            lookback_weeks: self.report.lookback_weeks,
        })
    }
}

/// Input data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of {SYMBOL}_{timeframe}.csv files
    pub data_dir: String,
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            symbols: [
                "SPY", "QQQ", "IWM", "DIA", "AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA",
                "TSLA", "AMD", "AVGO", "QCOM", "MU", "JPM", "BAC", "GS", "MS", "XLE", "XLF",
                "XLK", "XLV",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeframes: Timeframe::ALL.iter().map(|tf| tf.name().to_string()).collect(),
        }
    }
}

impl DataConfig {
    /// Get symbols as typed Symbol objects
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(Symbol::new).collect()
    }
}

/// Detection and simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Minimum aligned coarser timeframes for an event to survive
    pub min_confluence: u32,
    /// Forward bars replayed per event
    pub lookahead_bars: usize,
    /// Replay full bar ranges; false compares closes only
    pub use_ohlc_precision: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_confluence: 3,
            lookahead_bars: 10,
            use_ohlc_precision: true,
        }
    }
}

/// Aggregation and output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub group_by: Vec<String>,
    /// Horizons (in bars) for forward move measurement
    pub horizons: Vec<u32>,
    /// Groups with fewer simulated events are dropped from the report
    pub min_samples: usize,
    /// Weeks behind the frequency statistic; None derives it from the data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_weeks: Option<f64>,
    /// Rows printed in the console ranking
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            group_by: vec!["timeframe".to_string(), "pattern".to_string()],
            horizons: vec![1, 3, 5, 10],
            min_samples: 10,
            lookback_weeks: Some(52.0),
            top_n: 10,
        }
    }
}
