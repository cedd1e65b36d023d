//! Trade proposal and fixed reward-to-risk bracket computation

use super::bias::BiasLabel;
use super::collaborators::AdvisoryVerdict;
use super::continuation::{ContinuationDirection, ContinuationSetup};
use super::gaps::Gap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RiskParams {
    /// Fraction of the entry-to-boundary distance risked (default: 0.5)
    pub risk_fraction: f64,
    /// Reward as a multiple of risk (default: 2.0)
    pub reward_multiple: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            risk_fraction: 0.5,
            reward_multiple: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Long,
    Short,
}

impl From<ContinuationDirection> for TradeDirection {
    fn from(d: ContinuationDirection) -> Self {
        match d {
            ContinuationDirection::BullishContinuation => TradeDirection::Long,
            ContinuationDirection::BearishContinuation => TradeDirection::Short,
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "LONG"),
            TradeDirection::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brackets {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk: f64,
    pub reward: f64,
}

/// Stop and target anchored to the gap boundary nearest `entry`.
/// An entry sitting exactly on that boundary measures to the far one instead.
pub fn compute_brackets(
    entry: f64,
    anchor: &Gap,
    direction: TradeDirection,
    params: &RiskParams,
) -> Brackets {
    let to_lower = (entry - anchor.lower_bound).abs();
    let to_upper = (entry - anchor.upper_bound).abs();
    let mut distance = to_lower.min(to_upper);
    if distance == 0.0 {
        distance = to_lower.max(to_upper);
    }

    let risk = params.risk_fraction * distance;
    let reward = params.reward_multiple * risk;

    let (stop_loss, take_profit) = match direction {
        TradeDirection::Long => (entry - risk, entry + reward),
        TradeDirection::Short => (entry + risk, entry - reward),
    };

    Brackets {
        stop_loss,
        take_profit,
        risk,
        reward,
    }
}

/// A completed workflow pass. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub supporting_bias: BiasLabel,
    pub supporting_setup: ContinuationSetup,
    /// Coarse-timeframe gap the brackets are anchored to
    pub anchor_gap: Gap,
    pub advisory: AdvisoryVerdict,
}

impl TradeProposal {
    pub fn build(
        timestamp: DateTime<Utc>,
        symbol: &str,
        bias: BiasLabel,
        advisory: AdvisoryVerdict,
        anchor_gap: Gap,
        setup: ContinuationSetup,
        params: &RiskParams,
    ) -> Self {
        let direction = TradeDirection::from(setup.direction);
        let entry = setup.entry_price;
        let brackets = compute_brackets(entry, &anchor_gap, direction, params);

        Self {
            id: Uuid::new_v4(),
            timestamp,
            symbol: symbol.to_string(),
            direction,
            entry_price: entry,
            stop_loss: brackets.stop_loss,
            take_profit: brackets.take_profit,
            supporting_bias: bias,
            supporting_setup: setup,
            anchor_gap,
            advisory,
        }
    }

    /// Multi-line alert block for the log
    pub fn alert_block(&self) -> String {
        format!(
            "ENTRY SIGNAL\n  time:      {}\n  symbol:    {}\n  direction: {}\n  entry:     {:.2}\n  stop:      {:.2}\n  target:    {:.2}\n  advisory:  {}\n  bias:      {} ({})\n  anchor:    {:.2} - {:.2}\n  setup:     {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.symbol,
            self.direction,
            self.entry_price,
            self.stop_loss,
            self.take_profit,
            self.advisory.rationale,
            self.supporting_bias.label,
            self.supporting_bias.rationale,
            self.anchor_gap.lower_bound,
            self.anchor_gap.upper_bound,
            self.supporting_setup.direction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::bars::test_support::bars_from_ranges;
    use super::super::gaps::detect_gaps;
    use super::*;

    fn anchor() -> Gap {
        // 50-55
        let series = bars_from_ranges(&[(50.0, 45.0), (58.0, 49.0), (60.0, 55.0)]);
        detect_gaps(&series).remove(0)
    }

    #[test]
    fn test_long_brackets_from_nearest_boundary() {
        let b = compute_brackets(56.0, &anchor(), TradeDirection::Long, &RiskParams::default());
        // nearest boundary 55, distance 1
        assert_eq!(b.risk, 0.5);
        assert_eq!(b.reward, 1.0);
        assert_eq!(b.stop_loss, 55.5);
        assert_eq!(b.take_profit, 57.0);
    }

    #[test]
    fn test_short_brackets() {
        let b = compute_brackets(51.0, &anchor(), TradeDirection::Short, &RiskParams::default());
        assert_eq!(b.risk, 0.5);
        assert_eq!(b.stop_loss, 51.5);
        assert_eq!(b.take_profit, 50.0);
    }

    #[test]
    fn test_entry_on_boundary_uses_far_side() {
        let b = compute_brackets(55.0, &anchor(), TradeDirection::Long, &RiskParams::default());
        assert_eq!(b.risk, 2.5);
        assert_eq!(b.stop_loss, 52.5);
        assert_eq!(b.take_profit, 60.0);
        assert!(b.reward == 2.0 * b.risk);
    }

    #[test]
    fn test_direction_mapping() {
        assert_eq!(
            TradeDirection::from(ContinuationDirection::BullishContinuation),
            TradeDirection::Long
        );
        assert_eq!(
            TradeDirection::from(ContinuationDirection::BearishContinuation),
            TradeDirection::Short
        );
        assert_eq!(TradeDirection::Short.to_string(), "SHORT");
    }
}
