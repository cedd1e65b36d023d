//! JSONL trade history, one `TradeProposal` per line

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use super::jsonl;
use crate::signal_core::{Result, SignalError, TradeHistoryStore, TradeProposal};

pub struct JsonlTradeHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTradeHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored proposals, oldest first
    pub async fn load_all(&self) -> Result<Vec<TradeProposal>> {
        jsonl::read_lines(&self.path).await.map_err(persistence)
    }
}

fn persistence(e: anyhow::Error) -> SignalError {
    SignalError::Persistence {
        record: "trade proposal",
        reason: format!("{:#}", e),
    }
}

#[async_trait]
impl TradeHistoryStore for JsonlTradeHistory {
    async fn append(&self, proposal: &TradeProposal) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        jsonl::append_line(&self.path, proposal)
            .await
            .map_err(persistence)?;
        info!("Recorded proposal {} to {}", proposal.id, self.path.display());
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        jsonl::count_lines(&self.path).await.map_err(persistence)
    }
}
