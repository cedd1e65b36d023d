//! Change in state of delivery (structure shift) detection
//!
//! A shift is confirmed at pivot `i` from a 5-bar window (i-2..=i+2):
//! the polarity's extreme retreats into the pivot for two bars, then advances
//! out of it for two bars while the opposite side also advances.
//!
//! Bullish: `high[i-2] > high[i-1] > high[i] < high[i+1] < high[i+2]`
//! and `low[i] < low[i+1] < low[i+2]`. Bearish mirrors it.

use super::bars::Bar;
use super::errors::{Result, SignalError};
use super::polarity::Polarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_SHIFT_BARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureShift {
    pub polarity: Polarity,
    /// Pivot bar timestamp
    pub time: DateTime<Utc>,
    /// Pivot bar close
    pub price: f64,
    pub confirmation_index: usize,
    pub high: f64,
    pub low: f64,
}

impl std::fmt::Display for StructureShift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} shift @ {:.2} ({}, idx {})",
            self.polarity,
            self.price,
            self.time.format("%Y-%m-%d %H:%M"),
            self.confirmation_index
        )
    }
}

/// All shifts with pivot index at or after `from_index`, in index order.
/// A pivot matches at most one polarity.
pub fn detect_shifts(series: &[Bar], from_index: usize) -> Result<Vec<StructureShift>> {
    if series.len() < MIN_SHIFT_BARS {
        return Err(SignalError::InsufficientData {
            detector: "structure shift detector",
            required: MIN_SHIFT_BARS,
            actual: series.len(),
        });
    }

    let mut shifts = Vec::new();
    for i in from_index.max(2)..=series.len() - 3 {
        for polarity in Polarity::BOTH {
            if is_pivot(series, i, polarity) {
                let bar = &series[i];
                shifts.push(StructureShift {
                    polarity,
                    time: bar.timestamp,
                    price: bar.close,
                    confirmation_index: i,
                    high: bar.high,
                    low: bar.low,
                });
            }
        }
    }

    Ok(shifts)
}

/// Most recent shift in the series
pub fn latest_shift(series: &[Bar]) -> Result<Option<StructureShift>> {
    Ok(detect_shifts(series, 0)?.pop())
}

fn is_pivot(series: &[Bar], i: usize, p: Polarity) -> bool {
    let ext = |k: usize| p.extreme(&series[k]);
    let base = |k: usize| p.base(&series[k]);

    p.retreats(ext(i - 2), ext(i - 1))
        && p.retreats(ext(i - 1), ext(i))
        && p.advances(ext(i), ext(i + 1))
        && p.advances(ext(i + 1), ext(i + 2))
        && p.advances(base(i), base(i + 1))
        && p.advances(base(i + 1), base(i + 2))
}
