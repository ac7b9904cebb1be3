//! Timeframe universe and ordering
//!
//! Confluence checks walk timeframes from finest to coarsest, so the
//! declaration order of the enum is load-bearing: derived `Ord` follows it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::ConfigError;

/// Scan timeframes, declared finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M30,
    H1,
    H2,
    H4,
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    /// Full universe, finest first.
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Timeframe::M30 => "30min",
            Timeframe::H1 => "1hour",
            Timeframe::H2 => "2hour",
            Timeframe::H4 => "4hour",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    /// Timeframes strictly coarser than this one, finest first.
    pub fn coarser(self) -> impl Iterator<Item = Timeframe> {
        Timeframe::ALL.into_iter().filter(move |tf| *tf > self)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30min" => Ok(Timeframe::M30),
            "1hour" => Ok(Timeframe::H1),
            "2hour" => Ok(Timeframe::H2),
            "4hour" => Ok(Timeframe::H4),
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            other => Err(ConfigError::UnknownTimeframe(other.to_string())),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> String {
        tf.name().to_string()
    }
}
