//! Price imbalance (fair value gap) detection and fill tracking
//!
//! A gap is a three-bar pattern where the outer bars' ranges leave an untraded
//! zone. Bullish: `high[i-1] < low[i+1]`. Bearish: `low[i-1] > high[i+1]`.
//! Fill tracking marks the first later bar that trades back into the zone.

use super::bars::{first_index_after, Bar};
use super::polarity::Polarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub polarity: Polarity,
    /// Timestamp of the middle bar
    pub formation_time: DateTime<Utc>,
    /// Index of the middle bar in the series the gap was detected in
    pub formation_index: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub midpoint: f64,
    pub filled: bool,
    pub fill_time: Option<DateTime<Utc>>,
}

impl Gap {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Price inside the zone, bounds inclusive
    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower_bound && price <= self.upper_bound
    }

    /// Zero inside the zone, otherwise distance to the nearest bound
    pub fn distance_to(&self, price: f64) -> f64 {
        if price < self.lower_bound {
            self.lower_bound - price
        } else if price > self.upper_bound {
            price - self.upper_bound
        } else {
            0.0
        }
    }

    /// Bar trades into the zone with positive overlap
    pub fn intersects(&self, bar: &Bar) -> bool {
        bar.overlaps(self.lower_bound, self.upper_bound)
    }
}

impl std::fmt::Display for Gap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} gap {:.2}-{:.2} @ {}",
            self.polarity,
            self.lower_bound,
            self.upper_bound,
            self.formation_time.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Scan every interior index for gaps, in chronological order.
/// Series shorter than three bars yield nothing.
pub fn detect_gaps(series: &[Bar]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    if series.len() < 3 {
        return gaps;
    }

    for i in 1..series.len() - 1 {
        let prev = &series[i - 1];
        let next = &series[i + 1];

        for polarity in Polarity::BOTH {
            let near = polarity.extreme(prev);
            let far = polarity.base(next);
            if !polarity.advances(near, far) {
                continue;
            }

            let lower_bound = near.min(far);
            let upper_bound = near.max(far);
            gaps.push(Gap {
                polarity,
                formation_time: series[i].timestamp,
                formation_index: i,
                lower_bound,
                upper_bound,
                midpoint: (lower_bound + upper_bound) / 2.0,
                filled: false,
                fill_time: None,
            });
        }
    }

    gaps
}

/// Mark fills for every gap not yet filled. A filled gap is never revisited,
/// so running this again over a longer series keeps earlier fills intact.
pub fn track_fills(series: &[Bar], gaps: &mut [Gap]) {
    for gap in gaps.iter_mut().filter(|g| !g.filled) {
        let start = first_index_after(series, gap.formation_time);
        if let Some(bar) = series[start..].iter().find(|b| gap.intersects(b)) {
            gap.filled = true;
            gap.fill_time = Some(bar.timestamp);
        }
    }
}

/// Unfilled gaps, in detection order
pub fn active_gaps(gaps: &[Gap]) -> Vec<Gap> {
    gaps.iter().filter(|g| !g.filled).cloned().collect()
}
