//! Command-line and environment configuration
//!
//! Every option has an environment fallback so the binary can run from a
//! `.env` file alone. Tunables not exposed here keep their struct defaults.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::advisory::{self, AdvisorySettings};
use crate::polygon;
use crate::signal_core::{
    AdvisoryDecision, Bias, ContinuationConfig, GapFailurePolicy, Outcome, RunnerConfig,
    WorkflowConfig,
};
use crate::storage::{FEEDBACK_FILE, TRADE_HISTORY_FILE};

#[derive(Parser, Debug)]
#[command(author, version, about = "Gated bias/gap/structure-shift continuation signals")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Polygon.io API key
    #[arg(long, env = "POLYGON_API_KEY", hide_env_values = true, global = true)]
    pub polygon_api_key: Option<String>,

    /// Advisory (OpenAI-compatible) API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "POLYGON_BASE_URL", default_value = polygon::DEFAULT_BASE_URL, global = true)]
    pub polygon_base_url: String,

    #[arg(long, env = "LLM_BASE_URL", default_value = advisory::DEFAULT_BASE_URL, global = true)]
    pub llm_base_url: String,

    /// Ticker to trade
    #[arg(short, long, env = "SYMBOL", default_value = "C:XAUUSD", global = true)]
    pub symbol: String,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-3.5-turbo", global = true)]
    pub llm_model: String,

    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.1, global = true)]
    pub llm_temperature: f32,

    /// Directory for trade history and feedback files
    #[arg(long, env = "DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Seconds between polls in `run`
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 60, global = true)]
    pub poll_interval_secs: u64,

    /// Fine bars scanned after each gap for a retest
    #[arg(long, default_value_t = 9, global = true)]
    pub lookahead_bars: usize,

    /// Stop the continuation search at the first retested gap without a shift
    #[arg(long, global = true)]
    pub abort_on_gap_failure: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Poll continuously until Ctrl-C
    Run,
    /// Run a single cycle with every gate due
    Once,
    /// Run one detector against fresh data and print its findings
    Analyze {
        #[command(subcommand)]
        target: AnalyzeTarget,
    },
    /// Record or review trade outcome feedback
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },
    /// Show stored record counts and the last proposal
    Status,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AnalyzeTarget {
    /// Daily bias labels
    Bias {
        /// Number of most recent labels to print
        #[arg(long, default_value_t = 5)]
        last: usize,
    },
    /// Coarse-timeframe gaps and their fill state
    Gaps {
        /// Only print unfilled gaps
        #[arg(long)]
        active: bool,
    },
    /// Fine-timeframe structure shifts
    Shifts {
        /// Hours of fine bars to scan
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Continuation search from the latest fine shift
    Continuation {
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FeedbackAction {
    /// Totals per outcome and accuracy
    Summary,
    /// Append an outcome note
    Add {
        /// Bias date (default: today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        bias: Bias,
        /// approve | reject | error
        #[arg(long)]
        decision: AdvisoryDecision,
        /// profitable | loss | neutral
        #[arg(long)]
        outcome: Outcome,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Write all feedback to a CSV file
    Export {
        #[arg(long, default_value = "feedback.csv")]
        output: PathBuf,
    },
}

impl Settings {
    pub fn polygon_key(&self) -> Result<&str> {
        self.polygon_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("POLYGON_API_KEY is not set"))
    }

    pub fn openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))
    }

    pub fn trade_history_path(&self) -> PathBuf {
        self.data_dir.join(TRADE_HISTORY_FILE)
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.data_dir.join(FEEDBACK_FILE)
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        let failure_policy = if self.abort_on_gap_failure {
            GapFailurePolicy::AbortOnFirstFailure
        } else {
            GapFailurePolicy::ContinueToNextGap
        };

        WorkflowConfig {
            symbol: self.symbol.clone(),
            continuation: ContinuationConfig {
                lookahead_bars: self.lookahead_bars,
                failure_policy,
            },
            ..WorkflowConfig::default()
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            ..RunnerConfig::default()
        }
    }

    pub fn advisory_settings(&self) -> AdvisorySettings {
        AdvisorySettings {
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            ..AdvisorySettings::default()
        }
    }
}
