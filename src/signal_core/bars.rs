//! OHLCV bar types shared by every detector

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar. Immutable once produced by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
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

    /// Close above open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Full high-low range
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Absolute body size
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// True when this bar's range overlaps `[lower, upper]` with positive width.
    /// Touching a bound exactly does not count.
    pub fn overlaps(&self, lower: f64, upper: f64) -> bool {
        self.low < upper && self.high > lower
    }
}

/// Unit of a bar timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeframeUnit {
    Minute,
    Hour,
    Day,
}

impl TimeframeUnit {
    /// Polygon `timespan` path segment
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeframeUnit::Minute => "minute",
            TimeframeUnit::Hour => "hour",
            TimeframeUnit::Day => "day",
        }
    }
}

/// Bar cadence, e.g. 4 hours or 3 minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeframe {
    pub multiplier: u32,
    pub unit: TimeframeUnit,
}

impl Timeframe {
    pub const DAILY: Timeframe = Timeframe::new(1, TimeframeUnit::Day);
    pub const FOUR_HOUR: Timeframe = Timeframe::new(4, TimeframeUnit::Hour);
    pub const THREE_MINUTE: Timeframe = Timeframe::new(3, TimeframeUnit::Minute);

    pub const fn new(multiplier: u32, unit: TimeframeUnit) -> Self {
        Self { multiplier, unit }
    }

    /// Wall-clock length of one bar
    pub fn duration(&self) -> Duration {
        let n = self.multiplier as i64;
        match self.unit {
            TimeframeUnit::Minute => Duration::minutes(n),
            TimeframeUnit::Hour => Duration::hours(n),
            TimeframeUnit::Day => Duration::days(n),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffix = match self.unit {
            TimeframeUnit::Minute => "m",
            TimeframeUnit::Hour => "h",
            TimeframeUnit::Day => "d",
        };
        write!(f, "{}{}", self.multiplier, suffix)
    }
}

/// Sort ascending by timestamp and drop duplicate timestamps (first wins).
///
/// Providers call this before handing a series to the detectors, which assume
/// strictly increasing timestamps.
pub fn normalize_series(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}

/// Index of the first bar strictly after `time`
pub fn first_index_after(series: &[Bar], time: DateTime<Utc>) -> usize {
    series.partition_point(|b| b.timestamp <= time)
}
