//! Continuation search
//!
//! Given a confirmed first shift, look for a gap that formed after it, a
//! retest of that gap within a bounded window, and an opposite shift from the
//! retest bar onward. The first gap (by formation time) that yields a valid
//! second shift wins.

use super::bars::Bar;
use super::errors::{Result, SignalError};
use super::gaps::{detect_gaps, Gap};
use super::polarity::Polarity;
use super::structure::{detect_shifts, StructureShift, MIN_SHIFT_BARS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do when a gap is retested but no opposite shift follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GapFailurePolicy {
    /// Try the next gap in formation order
    #[default]
    ContinueToNextGap,
    /// Stop the search and report nothing
    AbortOnFirstFailure,
}

#[derive(Debug, Clone)]
pub struct ContinuationConfig {
    /// Bars after the gap's formation bar scanned for a retest (default: 9)
    pub lookahead_bars: usize,
    pub failure_policy: GapFailurePolicy,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            lookahead_bars: 9,
            failure_policy: GapFailurePolicy::ContinueToNextGap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationDirection {
    BullishContinuation,
    BearishContinuation,
}

impl ContinuationDirection {
    /// The continuation runs against the first shift
    pub fn after(first: Polarity) -> Self {
        match first {
            Polarity::Bullish => ContinuationDirection::BearishContinuation,
            Polarity::Bearish => ContinuationDirection::BullishContinuation,
        }
    }
}

impl std::fmt::Display for ContinuationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContinuationDirection::BullishContinuation => write!(f, "bullish_continuation"),
            ContinuationDirection::BearishContinuation => write!(f, "bearish_continuation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationSetup {
    pub first_shift: StructureShift,
    pub gap: Gap,
    pub second_shift: StructureShift,
    /// Close of the retest bar
    pub entry_price: f64,
    pub direction: ContinuationDirection,
}

/// Search `series` for a continuation of `first_shift`.
///
/// A retest needs a positive-width overlap with the gap. A bar that only
/// touches a bound does not count, so the retest bar can be later than the
/// first bar after formation.
///
/// `Ok(None)` means the setup has not formed yet.
pub fn find_continuation(
    series: &[Bar],
    first_shift: &StructureShift,
    config: &ContinuationConfig,
) -> Result<Option<ContinuationSetup>> {
    if series.len() < MIN_SHIFT_BARS {
        return Err(SignalError::InsufficientData {
            detector: "continuation search",
            required: MIN_SHIFT_BARS,
            actual: series.len(),
        });
    }

    let wanted = first_shift.polarity.opposite();
    let last = series.len() - 1;

    for gap in detect_gaps(series)
        .into_iter()
        .filter(|g| g.formation_time > first_shift.time)
    {
        let start = gap.formation_index + 1;
        let end = gap
            .formation_index
            .saturating_add(config.lookahead_bars)
            .min(last);
        if start > end {
            continue;
        }

        let Some(retest) = (start..=end).find(|&j| gap.intersects(&series[j])) else {
            continue;
        };

        let second = detect_shifts(series, retest)?
            .into_iter()
            .find(|s| s.polarity == wanted);

        match second {
            Some(second_shift) => {
                debug!(
                    "Continuation: {} retested at idx {}, {}",
                    gap, retest, second_shift
                );
                return Ok(Some(ContinuationSetup {
                    first_shift: first_shift.clone(),
                    entry_price: series[retest].close,
                    direction: ContinuationDirection::after(first_shift.polarity),
                    gap,
                    second_shift,
                }));
            }
            None => {
                debug!("Continuation: {} retested at idx {} but no {} shift", gap, retest, wanted);
                if config.failure_policy == GapFailurePolicy::AbortOnFirstFailure {
                    return Ok(None);
                }
            }
        }
    }

    Ok(None)
}
