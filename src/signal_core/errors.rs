//! Error taxonomy for detectors and workflow collaborators.
//!
//! None of these are fatal to the process. The workflow maps each one to a
//! gate outcome: insufficient or unavailable data keeps the gate where it is,
//! an advisory failure rejects the candidate, and a persistence failure is
//! logged without rolling back the proposal.

use super::bars::Timeframe;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    /// Series too short for a detector's window
    #[error("insufficient data for {detector}: need at least {required} bars, got {actual}")]
    InsufficientData {
        detector: &'static str,
        required: usize,
        actual: usize,
    },

    /// Data provider returned nothing or failed
    #[error("no {timeframe} data for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        timeframe: Timeframe,
        reason: String,
    },

    /// Advisory oracle call failed or returned unparseable output
    #[error("advisory error: {0}")]
    Advisory(String),

    /// Append to a store failed
    #[error("failed to persist {record}: {reason}")]
    Persistence {
        record: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, SignalError>;
