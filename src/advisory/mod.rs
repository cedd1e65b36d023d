//! Advisory Oracle Integration
//!
//! Approves or rejects a daily bias through an OpenAI-compatible chat model,
//! falling back to a fixed rule when the account's quota is exhausted.
//!
//! # Components
//!
//! - [`client`] - HTTP client and `AdvisoryOracle` impl
//! - [`models`] - Request/response data types
//! - [`prompt`] - Prompt text, `DECISION:`/`REASON:` parsing, fallback rule

pub mod client;
pub mod models;
pub mod prompt;

pub use client::{AdvisoryClient, AdvisorySettings, DEFAULT_BASE_URL};
pub use prompt::{fallback_verdict, parse_verdict};
