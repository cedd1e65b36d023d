//! JSONL feedback log with summary and CSV export

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::jsonl;
use crate::signal_core::{FeedbackEntry, FeedbackStore, Outcome, Result, SignalError};

pub struct JsonlFeedback {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Totals per outcome over the whole log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub total: usize,
    pub profitable: usize,
    pub loss: usize,
    pub neutral: usize,
    /// profitable / total * 100, rounded to 2 dp; 0 when empty
    pub accuracy: f64,
}

impl FeedbackSummary {
    pub fn from_entries(entries: &[FeedbackEntry]) -> Self {
        let count = |o: Outcome| entries.iter().filter(|e| e.outcome == o).count();
        let total = entries.len();
        let profitable = count(Outcome::Profitable);
        let accuracy = if total == 0 {
            0.0
        } else {
            (profitable as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        };

        Self {
            total,
            profitable,
            loss: count(Outcome::Loss),
            neutral: count(Outcome::Neutral),
            accuracy,
        }
    }
}

impl std::fmt::Display for FeedbackSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries: {} profitable, {} loss, {} neutral ({:.2}% accuracy)",
            self.total, self.profitable, self.loss, self.neutral, self.accuracy
        )
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    date: String,
    bias: String,
    advisory_decision: String,
    outcome: String,
    note: &'a str,
    recorded_at: String,
}

fn persistence(e: anyhow::Error) -> SignalError {
    SignalError::Persistence {
        record: "feedback",
        reason: format!("{:#}", e),
    }
}

impl JsonlFeedback {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_all(&self) -> Result<Vec<FeedbackEntry>> {
        jsonl::read_lines(&self.path).await.map_err(persistence)
    }

    pub async fn summary(&self) -> Result<FeedbackSummary> {
        Ok(FeedbackSummary::from_entries(&self.load_all().await?))
    }

    /// Write every entry to `dest` as CSV with a header row. Returns the row count.
    pub async fn export_csv(&self, dest: &Path) -> Result<usize> {
        let entries = self.load_all().await?;
        write_csv(&entries, dest).map_err(persistence)?;
        Ok(entries.len())
    }
}

fn write_csv(entries: &[FeedbackEntry], dest: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    for e in entries {
        writer
            .serialize(CsvRow {
                date: e.date.to_string(),
                bias: e.bias.to_string(),
                advisory_decision: e.advisory_decision.to_string(),
                outcome: e.outcome.to_string(),
                note: &e.note,
                recorded_at: e.recorded_at.to_rfc3339(),
            })
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV")?;
    Ok(())
}

#[async_trait]
impl FeedbackStore for JsonlFeedback {
    async fn append(&self, entry: &FeedbackEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        jsonl::append_line(&self.path, entry)
            .await
            .map_err(persistence)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<FeedbackEntry>> {
        let mut entries = self.load_all().await?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}
