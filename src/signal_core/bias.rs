//! Daily directional bias classification
//!
//! Each daily bar from index 2 onward is labelled from a three-bar window
//! (i-2, i-1, i):
//! - higher-timeframe trend from the two prior closes
//! - closure strength from the current bar's body/range ratio
//! - a divergence heuristic comparing the current bar with the prior one
//!
//! Strong closure in the trend's direction sets the label. Divergence only
//! colours the rationale; an opposing divergence is recorded as a conflict
//! rather than flipping the label.

use super::bars::Bar;
use super::errors::{Result, SignalError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Bars needed for one label
pub const MIN_BIAS_BARS: usize = 3;

/// Body must exceed this fraction of the range for a strong closure
const STRONG_BODY_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosureStrength {
    Strong,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Divergence {
    Bullish,
    Bearish,
    Neutral,
}

/// Whether the current bar traded outside the prior bar's range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdArray {
    Retraced,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    Buy,
    Sell,
    Neutral,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bias::Buy => f.pad("Buy"),
            Bias::Sell => f.pad("Sell"),
            Bias::Neutral => f.pad("Neutral"),
        }
    }
}

impl std::str::FromStr for Bias {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Bias::Buy),
            "sell" => Ok(Bias::Sell),
            "neutral" => Ok(Bias::Neutral),
            other => Err(format!("unknown bias '{}'", other)),
        }
    }
}

/// Bias for one daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasLabel {
    pub date: NaiveDate,
    pub higher_timeframe_trend: Trend,
    pub closure_strength: ClosureStrength,
    pub divergence_signal: Divergence,
    pub pd_array: PdArray,
    pub label: Bias,
    /// Human-readable driver of the label, for audit and advisory prompts
    pub rationale: String,
}

/// Label every daily bar from index 2 onward, in chronological order
pub fn classify_bias(daily: &[Bar]) -> Result<Vec<BiasLabel>> {
    if daily.len() < MIN_BIAS_BARS {
        return Err(SignalError::InsufficientData {
            detector: "bias classifier",
            required: MIN_BIAS_BARS,
            actual: daily.len(),
        });
    }

    Ok(daily
        .windows(MIN_BIAS_BARS)
        .map(|w| label_window(&w[0], &w[1], &w[2]))
        .collect())
}

/// Most recent label, if any
pub fn latest_bias(daily: &[Bar]) -> Result<Option<BiasLabel>> {
    Ok(classify_bias(daily)?.pop())
}

fn label_window(prev2: &Bar, prev1: &Bar, curr: &Bar) -> BiasLabel {
    let trend = if prev2.close < prev1.close {
        Trend::Up
    } else {
        Trend::Down
    };

    let closure = if curr.body() > STRONG_BODY_RATIO * curr.range() {
        ClosureStrength::Strong
    } else {
        ClosureStrength::Weak
    };

    let divergence = if prev1.close < curr.close && prev1.low > curr.low {
        Divergence::Bullish
    } else if prev1.close > curr.close && prev1.high < curr.high {
        Divergence::Bearish
    } else {
        Divergence::Neutral
    };

    let pd_array = if curr.low < prev1.low || curr.high > prev1.high {
        PdArray::Retraced
    } else {
        PdArray::None
    };

    let (label, rationale) = decide(trend, closure, divergence);

    BiasLabel {
        date: curr.timestamp.date_naive(),
        higher_timeframe_trend: trend,
        closure_strength: closure,
        divergence_signal: divergence,
        pd_array,
        label,
        rationale,
    }
}

fn decide(trend: Trend, closure: ClosureStrength, divergence: Divergence) -> (Bias, String) {
    if closure == ClosureStrength::Weak {
        let trend_name = match trend {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
        };
        return (
            Bias::Neutral,
            format!(
                "Weak closure: insufficient momentum for a directional bias (HTF trend {})",
                trend_name
            ),
        );
    }

    let (label, side, agreeing, opposing) = match trend {
        Trend::Up => (Bias::Buy, "bullish", Divergence::Bullish, Divergence::Bearish),
        Trend::Down => (Bias::Sell, "bearish", Divergence::Bearish, Divergence::Bullish),
    };
    let trend_name = if trend == Trend::Up { "UP" } else { "DOWN" };

    let rationale = if divergence == agreeing {
        format!(
            "Strong {} confluence: HTF trend {} + strong closure + {} divergence",
            side, trend_name, side
        )
    } else if divergence == opposing {
        format!(
            "Conflicting signals: HTF trend {} + strong closure, but {} divergence",
            trend_name, divergence_name(opposing)
        )
    } else {
        format!(
            "Moderate {} signal: HTF trend {} + strong closure (divergence neutral)",
            side, trend_name
        )
    };

    (label, rationale)
}

fn divergence_name(d: Divergence) -> &'static str {
    match d {
        Divergence::Bullish => "bullish",
        Divergence::Bearish => "bearish",
        Divergence::Neutral => "neutral",
    }
}

#[cfg(test)]
mod tests {
    use super::super::bars::test_support::ts;
    use super::*;

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(ts(i * 24), open, high, low, close, 1_000.0)
    }

    #[test]
    fn test_strong_up_with_bullish_divergence_is_buy() {
        let daily = vec![
            bar(0, 99.0, 101.0, 98.0, 100.0),
            bar(1, 100.0, 106.0, 104.0, 105.0),
            // body 4 over range 7.5 -> strong
            bar(2, 106.0, 110.5, 103.0, 110.0),
        ];

        let labels = classify_bias(&daily).unwrap();
        assert_eq!(labels.len(), 1);
        let l = &labels[0];
        assert_eq!(l.higher_timeframe_trend, Trend::Up);
        assert_eq!(l.closure_strength, ClosureStrength::Strong);
        assert_eq!(l.divergence_signal, Divergence::Bullish);
        assert_eq!(l.label, Bias::Buy);
        assert!(l.rationale.contains("confluence"));
    }

    #[test]
    fn test_bearish_divergence_conflict_keeps_buy() {
        let daily = vec![
            bar(0, 99.0, 101.0, 98.0, 100.0),
            bar(1, 100.0, 108.0, 99.0, 107.0),
            // close below prior close, high above prior high, strong body
            bar(2, 106.5, 110.0, 100.0, 101.0),
        ];

        let l = latest_bias(&daily).unwrap().unwrap();
        assert_eq!(l.divergence_signal, Divergence::Bearish);
        assert_eq!(l.label, Bias::Buy);
        assert!(l.rationale.starts_with("Conflicting"));
    }

    #[test]
    fn test_strong_down_is_sell() {
        let daily = vec![
            bar(0, 110.0, 111.0, 104.0, 105.0),
            bar(1, 105.0, 106.0, 99.0, 100.0),
            bar(2, 100.0, 100.5, 94.0, 95.0),
        ];

        let l = latest_bias(&daily).unwrap().unwrap();
        assert_eq!(l.higher_timeframe_trend, Trend::Down);
        assert_eq!(l.label, Bias::Sell);
        assert_eq!(l.divergence_signal, Divergence::Neutral);
        assert!(l.rationale.starts_with("Moderate bearish"));
    }

    #[test]
    fn test_weak_closure_is_neutral() {
        let daily = vec![
            bar(0, 99.0, 101.0, 98.0, 100.0),
            bar(1, 100.0, 106.0, 104.0, 105.0),
            bar(2, 105.0, 110.0, 100.0, 106.0),
        ];

        let l = latest_bias(&daily).unwrap().unwrap();
        assert_eq!(l.closure_strength, ClosureStrength::Weak);
        assert_eq!(l.label, Bias::Neutral);
        assert!(l.rationale.contains("HTF trend UP"));
    }

    #[test]
    fn test_one_label_per_bar_from_index_two() {
        let daily: Vec<Bar> = (0..6)
            .map(|i| {
                let base = 100.0 + i as f64;
                bar(i, base, base + 2.0, base - 1.0, base + 1.5)
            })
            .collect();

        let labels = classify_bias(&daily).unwrap();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels[0].date, daily[2].timestamp.date_naive());
        assert_eq!(labels[3].date, daily[5].timestamp.date_naive());
        assert_eq!(labels, classify_bias(&daily).unwrap());
    }

    #[test]
    fn test_insufficient_data() {
        let daily = vec![bar(0, 1.0, 2.0, 0.5, 1.5), bar(1, 1.0, 2.0, 0.5, 1.5)];
        assert!(matches!(
            classify_bias(&daily),
            Err(SignalError::InsufficientData { required: 3, actual: 2, .. })
        ));
    }
}
