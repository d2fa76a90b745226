//! Per-timer firing history in JSONL format.
//!
//! Stores one line per firing at `{dir}/fires/{timer_id}.jsonl`.
//! Auto-prunes files larger than 1MB, keeping the 1000 most recent entries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::record::TimerId;

/// Maximum log file size before pruning (1MB).
const MAX_LOG_SIZE: u64 = 1_024 * 1_024;

/// Number of entries to keep when pruning.
const ENTRIES_TO_KEEP: usize = 1000;

/// One firing of a timer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireLogEntry {
    /// Wall-clock instant of the firing (Unix timestamp ms).
    pub ts: i64,
    /// The instant the firing was scheduled for (Unix timestamp ms).
    pub scheduled: i64,
    /// Firings still scheduled after the shift committed.
    pub remaining: usize,
}

/// Firing log writer.
#[derive(Clone)]
pub struct FireLog {
    /// Base path for firing logs (e.g. `.chime/timers/fires`).
    fires_path: PathBuf,
}

impl FireLog {
    /// Create a new firing log at the given path.
    pub fn new(fires_path: PathBuf) -> Self {
        Self { fires_path }
    }

    /// Append a firing entry to a timer's log.
    pub async fn append(&self, id: TimerId, entry: &FireLogEntry) -> std::io::Result<()> {
        fs::create_dir_all(&self.fires_path).await?;

        let path = self.log_path(id);

        if let Ok(metadata) = fs::metadata(&path).await
            && metadata.len() > MAX_LOG_SIZE
            && let Err(e) = self.prune(&path).await
        {
            warn!(path = %path.display(), error = %e, "Failed to prune firing log");
        }

        let mut line =
            serde_json::to_string(entry).map_err(|e| std::io::Error::other(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(timer_id = %id, remaining = entry.remaining, "Firing logged");
        Ok(())
    }

    /// Read the most recent entries from a timer's log.
    pub async fn read_recent(&self, id: TimerId, limit: usize) -> std::io::Result<Vec<FireLogEntry>> {
        let path = self.log_path(id);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        let entries: Vec<FireLogEntry> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        let start = entries.len().saturating_sub(limit);
        Ok(entries[start..].to_vec())
    }

    /// Delete the log file for a timer.
    pub async fn delete(&self, id: TimerId) -> std::io::Result<()> {
        let path = self.log_path(id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// Prune a log file to keep only the most recent entries.
    async fn prune(&self, path: &Path) -> std::io::Result<()> {
        let content = fs::read_to_string(path).await?;
        let entries: Vec<&str> = content.lines().collect();

        if entries.len() <= ENTRIES_TO_KEEP {
            return Ok(());
        }

        let start = entries.len().saturating_sub(ENTRIES_TO_KEEP);
        let kept: Vec<&str> = entries[start..].to_vec();
        let new_content = kept.join("\n") + "\n";

        let temp_path = path.with_extension("jsonl.tmp");
        fs::write(&temp_path, new_content).await?;
        fs::rename(&temp_path, path).await?;

        debug!(
            path = %path.display(),
            before = entries.len(),
            after = kept.len(),
            "Pruned firing log"
        );
        Ok(())
    }

    fn log_path(&self, id: TimerId) -> PathBuf {
        self.fires_path.join(format!("{}.jsonl", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(ts: i64) -> FireLogEntry {
        FireLogEntry {
            ts,
            scheduled: ts,
            remaining: 0,
        }
    }

    #[tokio::test]
    async fn append_creates_file() {
        let tmp = TempDir::new().unwrap();
        let log = FireLog::new(tmp.path().join("fires"));

        log.append(1, &entry(1000)).await.unwrap();
        assert!(tmp.path().join("fires").join("1.jsonl").exists());
    }

    #[tokio::test]
    async fn read_recent_limits_results() {
        let tmp = TempDir::new().unwrap();
        let log = FireLog::new(tmp.path().join("fires"));

        for i in 0..10 {
            log.append(1, &entry(i * 1000)).await.unwrap();
        }

        let entries = log.read_recent(1, 3).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].ts, 7000);
        assert_eq!(entries[2].ts, 9000);
    }

    #[tokio::test]
    async fn read_recent_returns_empty_for_missing() {
        let tmp = TempDir::new().unwrap();
        let log = FireLog::new(tmp.path().join("fires"));
        assert!(log.read_recent(42, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let tmp = TempDir::new().unwrap();
        let log = FireLog::new(tmp.path().join("fires"));

        log.append(1, &entry(1000)).await.unwrap();
        log.delete(1).await.unwrap();
        assert!(!tmp.path().join("fires").join("1.jsonl").exists());
    }

    #[tokio::test]
    async fn prune_keeps_recent_entries() {
        let tmp = TempDir::new().unwrap();
        let log = FireLog::new(tmp.path().join("fires"));
        let path = tmp.path().join("fires").join("1.jsonl");

        fs::create_dir_all(tmp.path().join("fires")).await.unwrap();
        let mut content = String::new();
        for i in 0..1500 {
            content.push_str(&serde_json::to_string(&entry(i * 1000)).unwrap());
            content.push('\n');
        }
        fs::write(&path, &content).await.unwrap();

        log.prune(&path).await.unwrap();

        let entries = log.read_recent(1, 2000).await.unwrap();
        assert_eq!(entries.len(), ENTRIES_TO_KEEP);
        assert_eq!(entries[0].ts, 500 * 1000);
    }
}
