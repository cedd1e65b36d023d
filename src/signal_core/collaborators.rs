//! External collaborators of the workflow
//!
//! The workflow talks to market data, the advisory oracle and the two
//! append-only stores only through these traits. Concrete implementations
//! live in `polygon`, `advisory` and `storage`.

use super::bars::{Bar, Timeframe};
use super::bias::{Bias, BiasLabel};
use super::errors::Result;
use super::proposal::TradeProposal;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryDecision {
    Approve,
    Reject,
    /// Call failed or output could not be parsed. Gated like a reject.
    Error,
}

impl std::fmt::Display for AdvisoryDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisoryDecision::Approve => f.pad("approve"),
            AdvisoryDecision::Reject => f.pad("reject"),
            AdvisoryDecision::Error => f.pad("error"),
        }
    }
}

impl std::str::FromStr for AdvisoryDecision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approve" | "yes" => Ok(AdvisoryDecision::Approve),
            "reject" | "no" => Ok(AdvisoryDecision::Reject),
            "error" => Ok(AdvisoryDecision::Error),
            other => Err(format!("unknown advisory decision '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    pub decision: AdvisoryDecision,
    pub rationale: String,
}

impl AdvisoryVerdict {
    pub fn approve(rationale: impl Into<String>) -> Self {
        Self {
            decision: AdvisoryDecision::Approve,
            rationale: rationale.into(),
        }
    }

    pub fn reject(rationale: impl Into<String>) -> Self {
        Self {
            decision: AdvisoryDecision::Reject,
            rationale: rationale.into(),
        }
    }

    pub fn error(rationale: impl Into<String>) -> Self {
        Self {
            decision: AdvisoryDecision::Error,
            rationale: rationale.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == AdvisoryDecision::Approve
    }
}

/// Realized outcome of a past signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Profitable,
    Loss,
    Neutral,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Profitable => f.pad("profitable"),
            Outcome::Loss => f.pad("loss"),
            Outcome::Neutral => f.pad("neutral"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "profitable" | "profit" | "win" => Ok(Outcome::Profitable),
            "loss" | "lose" => Ok(Outcome::Loss),
            "neutral" | "flat" => Ok(Outcome::Neutral),
            other => Err(format!("unknown outcome '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub date: NaiveDate,
    pub bias: Bias,
    pub advisory_decision: AdvisoryDecision,
    pub outcome: Outcome,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// OHLCV source. Bars come back ascending with no duplicate timestamps.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;
}

/// Approve/reject gate consulted once per bias
#[async_trait]
pub trait AdvisoryOracle: Send + Sync {
    /// Never fails; transport and parse problems come back as `AdvisoryDecision::Error`
    async fn evaluate(&self, bias: &BiasLabel, context: &str) -> AdvisoryVerdict;
}

#[async_trait]
pub trait TradeHistoryStore: Send + Sync {
    async fn append(&self, proposal: &TradeProposal) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append(&self, entry: &FeedbackEntry) -> Result<()>;

    /// Up to `limit` most recent entries, oldest first
    async fn recent(&self, limit: usize) -> Result<Vec<FeedbackEntry>>;
}

/// Borrowed handles to every collaborator for one workflow step
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub provider: &'a dyn DataProvider,
    pub oracle: &'a dyn AdvisoryOracle,
    pub trade_history: &'a dyn TradeHistoryStore,
    pub feedback: &'a dyn FeedbackStore,
}

/// Render feedback entries as advisory context. Empty when there are none.
pub fn render_feedback_context(entries: &[FeedbackEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = String::from("Recent feedback:");
    for e in entries {
        out.push_str(&format!("\n- {}: {}", e.date, e.note));
    }
    out
}

/// Read the recent feedback window; a failed read yields empty context
pub async fn load_feedback_context(store: &dyn FeedbackStore, limit: usize) -> String {
    match store.recent(limit).await {
        Ok(entries) => render_feedback_context(&entries),
        Err(e) => {
            warn!("Feedback context unavailable: {}", e);
            String::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MemoryFeedback;
    use super::*;

    fn entry(day: u32, note: &str) -> FeedbackEntry {
        FeedbackEntry {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            bias: Bias::Buy,
            advisory_decision: AdvisoryDecision::Approve,
            outcome: Outcome::Profitable,
            note: note.to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_feedback_context() {
        assert_eq!(render_feedback_context(&[]), "");
        let ctx = render_feedback_context(&[entry(3, "clean fill"), entry(4, "stopped out")]);
        assert_eq!(
            ctx,
            "Recent feedback:\n- 2025-03-03: clean fill\n- 2025-03-04: stopped out"
        );
    }

    #[tokio::test]
    async fn test_load_feedback_context_uses_window() {
        let store = MemoryFeedback::default();
        for day in 1..=7 {
            store.append(&entry(day, &format!("note {}", day))).await.unwrap();
        }

        let ctx = load_feedback_context(&store, 5).await;
        assert!(!ctx.contains("note 2"));
        assert!(ctx.contains("note 3"));
        assert!(ctx.ends_with("note 7"));
    }

    #[test]
    fn test_feedback_entry_json_shape() {
        let json = serde_json::to_value(entry(3, "x")).unwrap();
        assert_eq!(json["advisoryDecision"], "approve");
        assert_eq!(json["outcome"], "profitable");
        assert_eq!(json["bias"], "Buy");
        assert!(json.get("recordedAt").is_some());
    }

    #[test]
    fn test_parse_outcome() {
        assert_eq!("Profitable".parse::<Outcome>().unwrap(), Outcome::Profitable);
        assert_eq!("loss".parse::<Outcome>().unwrap(), Outcome::Loss);
        assert!("maybe".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_display_honours_width() {
        assert_eq!(format!("{:<8}|", AdvisoryDecision::Reject), "reject  |");
        assert_eq!(format!("{:<10}|", Outcome::Loss), "loss      |");
        assert_eq!(format!("{:<7}|", Bias::Buy), "Buy    |");
        assert_eq!(Outcome::Profitable.to_string(), "profitable");
    }
}
