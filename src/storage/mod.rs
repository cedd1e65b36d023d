//! File-backed persistence
//!
//! Both stores are append-only JSON Lines files under the data directory:
//! - `trade_history.jsonl` - one emitted `TradeProposal` per line
//! - `feedback.jsonl` - outcome notes fed back into advisory prompts

pub mod feedback;
pub mod jsonl;
pub mod trade_history;

pub use feedback::{FeedbackSummary, JsonlFeedback};
pub use trade_history::JsonlTradeHistory;

pub const TRADE_HISTORY_FILE: &str = "trade_history.jsonl";
pub const FEEDBACK_FILE: &str = "feedback.jsonl";
