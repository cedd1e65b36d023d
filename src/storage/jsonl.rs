//! Append-only JSON Lines files

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Serialize `record` as one line and append it, creating the file and its parent directory
pub async fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut line = serde_json::to_string(record).context("Failed to serialize record")?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.flush().await?;

    Ok(())
}

/// Read every record in file order. A missing file is empty; malformed lines are skipped.
pub async fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed line {} in {}: {}", n + 1, path.display(), e),
        }
    }

    Ok(records)
}

/// Number of non-blank lines. A missing file has none.
pub async fn count_lines(path: &Path) -> Result<usize> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text.lines().filter(|l| !l.trim().is_empty()).count()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    #[tokio::test]
    async fn test_append_creates_parent_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rows.jsonl");

        append_line(&path, &Row { n: 1 }).await.unwrap();
        append_line(&path, &Row { n: 2 }).await.unwrap();

        let rows: Vec<Row> = read_lines(&path).await.unwrap();
        assert_eq!(rows, vec![Row { n: 1 }, Row { n: 2 }]);
        assert_eq!(count_lines(&path).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_and_bad_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");

        let rows: Vec<Row> = read_lines(&path).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(count_lines(&path).await.unwrap(), 0);

        std::fs::write(&path, "{\"n\":1}\nnot json\n\n{\"n\":3}\n").unwrap();
        let rows: Vec<Row> = read_lines(&path).await.unwrap();
        assert_eq!(rows, vec![Row { n: 1 }, Row { n: 3 }]);
    }
}
