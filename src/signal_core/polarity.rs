//! Bullish/bearish polarity shared by the gap and structure detectors.
//!
//! Both detectors run a single algorithm parameterised by polarity. For a given
//! polarity, `extreme` is the side of a bar the move pushes (high for bullish,
//! low for bearish), `base` is the other side, and `advances` is the
//! strict comparison in the polarity's direction.

use super::bars::Bar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Bullish,
    Bearish,
}

impl Polarity {
    pub const BOTH: [Polarity; 2] = [Polarity::Bullish, Polarity::Bearish];

    pub fn opposite(self) -> Self {
        match self {
            Polarity::Bullish => Polarity::Bearish,
            Polarity::Bearish => Polarity::Bullish,
        }
    }

    /// High for bullish, low for bearish
    pub fn extreme(self, bar: &Bar) -> f64 {
        match self {
            Polarity::Bullish => bar.high,
            Polarity::Bearish => bar.low,
        }
    }

    /// Low for bullish, high for bearish
    pub fn base(self, bar: &Bar) -> f64 {
        match self {
            Polarity::Bullish => bar.low,
            Polarity::Bearish => bar.high,
        }
    }

    /// `to` lies strictly beyond `from` in this polarity's direction
    pub fn advances(self, from: f64, to: f64) -> bool {
        match self {
            Polarity::Bullish => to > from,
            Polarity::Bearish => to < from,
        }
    }

    /// `to` lies strictly behind `from` in this polarity's direction
    pub fn retreats(self, from: f64, to: f64) -> bool {
        self.opposite().advances(from, to)
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Bullish => write!(f, "bullish"),
            Polarity::Bearish => write!(f, "bearish"),
        }
    }
}
