//! Advisory prompt construction, response parsing and the quota fallback rule

use crate::signal_core::{AdvisoryVerdict, Bias, BiasLabel, ClosureStrength};

pub const SYSTEM_PROMPT: &str =
    "You are a conservative trading advisor focused on risk management.";

pub fn build_user_prompt(bias: &BiasLabel, feedback_context: &str) -> String {
    format!(
        "You are an expert trading advisor. Analyze this trading opportunity and provide a clear YES or NO decision.

CURRENT BIAS ANALYSIS:
- Date: {date}
- Predicted Bias: {label}
- Reason: {rationale}
- HTF Trend: {trend:?}
- Closure Strength: {closure:?}
- Divergence Signal: {divergence:?}
- PD Array: {pd:?}

{feedback_context}

TRADING RULES:
1. Only take trades with strong confluence
2. Be conservative with conflicting signals
3. Consider recent feedback and learning
4. Risk management is priority

DECISION: Should I proceed to look for 4H gap setups? Answer only YES or NO, followed by a brief reason.

Format your response as:
DECISION: [YES/NO]
REASON: [Brief explanation]",
        date = bias.date,
        label = bias.label,
        rationale = bias.rationale,
        trend = bias.higher_timeframe_trend,
        closure = bias.closure_strength,
        divergence = bias.divergence_signal,
        pd = bias.pd_array,
    )
}

/// Read `DECISION:` and `REASON:` lines. Anything else is an error verdict.
pub fn parse_verdict(response: &str) -> AdvisoryVerdict {
    let field = |key: &str| {
        response
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(key))
            .map(|rest| rest.trim().to_string())
    };

    let (Some(decision), Some(reason)) = (field("DECISION:"), field("REASON:")) else {
        return AdvisoryVerdict::error(format!("Could not parse advisory response: {}", response));
    };

    let upper = decision.to_ascii_uppercase();
    if upper.starts_with("YES") {
        AdvisoryVerdict::approve(reason)
    } else if upper.starts_with("NO") {
        AdvisoryVerdict::reject(reason)
    } else {
        AdvisoryVerdict::error(format!("Unrecognised decision '{}': {}", decision, reason))
    }
}

/// Rule-based verdict used when the advisory quota is exhausted.
/// Only a strong-closure Buy is approved.
pub fn fallback_verdict(bias: &BiasLabel) -> AdvisoryVerdict {
    let strong = bias.closure_strength == ClosureStrength::Strong;
    let (approve, reason) = match bias.label {
        Bias::Buy if strong => (true, "Strong buy signal with strong closure"),
        Bias::Sell if strong => (false, "Strong sell signal - avoid long positions"),
        Bias::Neutral => (false, "Neutral bias - insufficient confluence"),
        _ => (false, "Weak signals - conservative approach"),
    };

    let rationale = format!("FALLBACK: {} (advisory quota exceeded)", reason);
    if approve {
        AdvisoryVerdict::approve(rationale)
    } else {
        AdvisoryVerdict::reject(rationale)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::signal_core::*;
    use chrono::NaiveDate;

    pub fn label(bias: Bias, closure: ClosureStrength) -> BiasLabel {
        BiasLabel {
            date: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            higher_timeframe_trend: Trend::Up,
            closure_strength: closure,
            divergence_signal: Divergence::Neutral,
            pd_array: PdArray::Retraced,
            label: bias,
            rationale: "Moderate bullish signal".to_string(),
        }
    }
}
