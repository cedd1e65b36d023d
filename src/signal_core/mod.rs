//! Signal Core - detectors and the gated workflow
//!
//! This module contains the pure pattern detectors and the workflow that
//! sequences them into a single trade decision:
//! - Bar series and timeframes
//! - Daily bias classification
//! - Gap (price imbalance) detection and fill tracking
//! - Structure shift detection
//! - Continuation search
//! - Workflow state machine, gate triggers and the polling runner
//!
//! Nothing here performs I/O directly; market data, the advisory oracle and
//! persistence come in through the traits in `collaborators`.

pub mod bars;
pub mod bias;
pub mod collaborators;
pub mod continuation;
pub mod errors;
pub mod gaps;
pub mod polarity;
pub mod proposal;
pub mod runner;
pub mod state_machine;
pub mod structure;
pub mod trigger;

// Re-export commonly used types
pub use bars::{normalize_series, Bar, Timeframe, TimeframeUnit};
pub use bias::{classify_bias, latest_bias, Bias, BiasLabel, ClosureStrength, Divergence, PdArray, Trend};
pub use collaborators::{
    render_feedback_context, AdvisoryDecision, AdvisoryOracle, AdvisoryVerdict, Collaborators,
    DataProvider, FeedbackEntry, FeedbackStore, Outcome, TradeHistoryStore,
};
pub use continuation::{
    find_continuation, ContinuationConfig, ContinuationDirection, ContinuationSetup, GapFailurePolicy,
};
pub use errors::{Result, SignalError};
pub use gaps::{active_gaps, detect_gaps, track_fills, Gap};
pub use polarity::Polarity;
pub use proposal::{compute_brackets, RiskParams, TradeDirection, TradeProposal};
pub use runner::{LiveRunner, RunnerConfig};
pub use state_machine::{RemainCause, StateTransition, Workflow, WorkflowConfig, WorkflowState};
pub use structure::{detect_shifts, latest_shift, StructureShift};
pub use trigger::{Cadence, GateSchedule, OneShotTrigger};
