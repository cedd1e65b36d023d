// Library crate - exports the signal core and its integrations

pub mod advisory;
pub mod config;
pub mod polygon;
pub mod signal_core;
pub mod storage;

// Re-export commonly used types
pub use signal_core::{StateTransition, TradeProposal, Workflow, WorkflowConfig, WorkflowState};
