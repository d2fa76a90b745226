//! Timer record persistence.
//!
//! Stores records in `{dir}/{id}.json` with an in-memory cache. The cache
//! serves every query; disk is the durable copy recovered on startup. All
//! operations are atomic per call; the dispatcher's shift step is expressed
//! as delete-returning-row plus reinsert-with-same-id, so no cross-call
//! transaction is needed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::{Result, TimerError};
use super::record::{TimerDraft, TimerId, TimerPayload, TimerRecord};

/// Store for timer records.
#[derive(Clone)]
pub struct TimerStore {
    inner: Arc<RwLock<TimerStoreInner>>,
    /// Base path for record storage (e.g. `.chime/timers`).
    timers_path: PathBuf,
}

struct TimerStoreInner {
    /// Cached records by id.
    records: HashMap<TimerId, TimerRecord>,
    /// Next id to assign; recovered as `max(id) + 1` on load.
    next_id: TimerId,
}

impl TimerStore {
    /// Create a new store at the given path.
    pub fn new(timers_path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TimerStoreInner {
                records: HashMap::new(),
                next_id: 1,
            })),
            timers_path,
        }
    }

    /// Load all records from disk.
    ///
    /// Call this on startup to restore persisted timers.
    pub async fn load(&self) -> Result<LoadResult> {
        if !self.timers_path.exists() {
            fs::create_dir_all(&self.timers_path)
                .await
                .map_err(|e| TimerError::Storage(e.to_string()))?;
            return Ok(LoadResult::default());
        }

        let mut loaded = 0;
        let mut errors = Vec::new();

        let mut entries = fs::read_dir(&self.timers_path)
            .await
            .map_err(|e| TimerError::Storage(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TimerError::Storage(e.to_string()))?
        {
            let path = entry.path();

            // Skip the fires directory and anything that isn't a record file
            if path.is_dir() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match self.load_record_file(&path).await {
                Ok(record) => {
                    let mut inner = self.inner.write().await;
                    inner.next_id = inner.next_id.max(record.id + 1);
                    inner.records.insert(record.id, record);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load timer record");
                    errors.push((path.display().to_string(), e.to_string()));
                }
            }
        }

        if loaded > 0 {
            info!(loaded = loaded, errors = errors.len(), "Loaded timer records");
        }

        Ok(LoadResult { loaded, errors })
    }

    async fn load_record_file(&self, path: &Path) -> Result<TimerRecord> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| TimerError::Storage(format!("read {}: {}", path.display(), e)))?;

        let record: TimerRecord = serde_json::from_str(&content)
            .map_err(|e| TimerError::Storage(format!("parse {}: {}", path.display(), e)))?;

        Ok(record)
    }

    /// Persist a new record, assigning the next id.
    pub async fn create(&self, draft: TimerDraft) -> Result<TimerRecord> {
        let record = {
            let mut inner = self.inner.write().await;
            let id = inner.next_id;
            inner.next_id += 1;
            draft.with_id(id)
        };

        self.persist(&record).await?;

        let mut inner = self.inner.write().await;
        inner.records.insert(record.id, record.clone());

        debug!(timer_id = %record.id, expires = %record.expires, "Created timer");
        Ok(record)
    }

    /// Persist a record that already carries its id (reschedule path).
    ///
    /// The id counter is bumped past the explicit id so counter-assigned ids
    /// never collide with it.
    pub async fn reinsert(&self, record: TimerRecord) -> Result<()> {
        self.persist(&record).await?;

        let mut inner = self.inner.write().await;
        inner.next_id = inner.next_id.max(record.id + 1);
        inner.records.insert(record.id, record.clone());

        debug!(timer_id = %record.id, expires = %record.expires, "Reinserted timer");
        Ok(())
    }

    /// Get a record by id.
    pub async fn get(&self, id: TimerId) -> Option<TimerRecord> {
        let inner = self.inner.read().await;
        inner.records.get(&id).cloned()
    }

    /// The record with globally minimum `expires` among those expiring
    /// within `horizon` from now, if any. Ties break by id.
    pub async fn nearest(&self, horizon: Duration) -> Option<TimerRecord> {
        let cutoff = Utc::now() + horizon;
        let inner = self.inner.read().await;
        inner
            .records
            .values()
            .filter(|r| r.expires <= cutoff)
            .min_by_key(|r| (r.expires, r.id))
            .cloned()
    }

    /// Delete a record, returning the old row.
    pub async fn delete(&self, id: TimerId) -> Result<Option<TimerRecord>> {
        let removed = {
            let mut inner = self.inner.write().await;
            inner.records.remove(&id)
        };

        if removed.is_some() {
            let path = self.record_path(id);
            if path.exists() {
                fs::remove_file(&path).await.map_err(|e| {
                    TimerError::Storage(format!("delete {}: {}", path.display(), e))
                })?;
            }
            debug!(timer_id = %id, "Deleted timer");
        }

        Ok(removed)
    }

    /// Delete every record whose payload matches the predicate.
    ///
    /// Used for cascade deletes when a destination goes away.
    pub async fn delete_where<F>(&self, predicate: F) -> Result<Vec<TimerRecord>>
    where
        F: Fn(&TimerPayload) -> bool,
    {
        let ids: Vec<TimerId> = {
            let inner = self.inner.read().await;
            inner
                .records
                .values()
                .filter(|r| predicate(&r.payload))
                .map(|r| r.id)
                .collect()
        };

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.delete(id).await? {
                removed.push(record);
            }
        }
        Ok(removed)
    }

    /// List records for an (event, author) pair, ascending by expiry,
    /// bounded by `limit`.
    pub async fn list_by(&self, event: &str, author_id: u64, limit: usize) -> Vec<TimerRecord> {
        let inner = self.inner.read().await;
        let mut records: Vec<TimerRecord> = inner
            .records
            .values()
            .filter(|r| r.event == event && r.payload.author_id == author_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.expires, r.id));
        records.truncate(limit);
        records
    }

    /// List records targeting a channel, ascending by expiry.
    pub async fn list_by_channel(&self, event: &str, channel_id: u64) -> Vec<TimerRecord> {
        let inner = self.inner.read().await;
        let mut records: Vec<TimerRecord> = inner
            .records
            .values()
            .filter(|r| r.event == event && r.payload.channel_id == channel_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.expires, r.id));
        records
    }

    /// Count records for an (event, author) pair.
    pub async fn count_by(&self, event: &str, author_id: u64) -> usize {
        let inner = self.inner.read().await;
        inner
            .records
            .values()
            .filter(|r| r.event == event && r.payload.author_id == author_id)
            .count()
    }

    /// Persist a record to disk, atomically via temp file.
    async fn persist(&self, record: &TimerRecord) -> Result<()> {
        fs::create_dir_all(&self.timers_path)
            .await
            .map_err(|e| TimerError::Storage(e.to_string()))?;

        let path = self.record_path(record.id);
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| TimerError::Storage(format!("serialize: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await.map_err(|e| {
            TimerError::Storage(format!("write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            TimerError::Storage(format!("rename {}: {}", temp_path.display(), e))
        })?;

        Ok(())
    }

    fn record_path(&self, id: TimerId) -> PathBuf {
        self.timers_path.join(format!("{}.json", id))
    }

    /// Get the path to the timers directory.
    pub fn path(&self) -> &Path {
        &self.timers_path
    }
}

/// Result of loading records from disk.
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Number of records loaded.
    pub loaded: usize,
    /// Errors encountered (path, error message).
    pub errors: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::record::TimerDraft;
    use chrono::Duration;
    use tempfile::TempDir;

    fn payload(author_id: u64, channel_id: u64) -> TimerPayload {
        TimerPayload {
            message: "ping".to_string(),
            channel_id,
            author_id,
            origin_message_id: 1,
        }
    }

    fn draft(offset_secs: i64, author_id: u64) -> TimerDraft {
        TimerDraft::new(
            "blast",
            vec![Utc::now() + Duration::seconds(offset_secs)],
            Utc::now(),
            payload(author_id, 5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_monotonic_ids() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        let a = store.create(draft(10, 1)).await.unwrap();
        let b = store.create(draft(20, 1)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn get_returns_none_for_missing() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));
        assert!(store.get(99).await.is_none());
    }

    #[tokio::test]
    async fn reinsert_preserves_id_and_bumps_counter() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        let record = draft(10, 1).with_id(7);
        store.reinsert(record.clone()).await.unwrap();
        assert_eq!(store.get(7).await.unwrap().id, 7);

        // Fresh creates must not collide with the explicit id
        let next = store.create(draft(20, 1)).await.unwrap();
        assert_eq!(next.id, 8);
    }

    #[tokio::test]
    async fn nearest_picks_minimum_expiry() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        store.create(draft(300, 1)).await.unwrap();
        let soon = store.create(draft(10, 1)).await.unwrap();
        store.create(draft(600, 1)).await.unwrap();

        let nearest = store.nearest(Duration::days(40)).await.unwrap();
        assert_eq!(nearest.id, soon.id);
    }

    #[tokio::test]
    async fn nearest_respects_horizon() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        store.create(draft(3600, 1)).await.unwrap();
        assert!(store.nearest(Duration::minutes(5)).await.is_none());
        assert!(store.nearest(Duration::hours(2)).await.is_some());
    }

    #[tokio::test]
    async fn delete_returns_old_row() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        let record = store.create(draft(10, 1)).await.unwrap();
        let removed = store.delete(record.id).await.unwrap().unwrap();
        assert_eq!(removed, record);
        assert!(store.get(record.id).await.is_none());
        assert!(store.delete(record.id).await.unwrap().is_none());

        let path = tmp.path().join("timers").join(format!("{}.json", record.id));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn delete_where_cascades_on_channel() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        let gone = TimerDraft::new(
            "blast",
            vec![Utc::now() + Duration::seconds(10)],
            Utc::now(),
            payload(1, 111),
        )
        .unwrap();
        let kept = TimerDraft::new(
            "blast",
            vec![Utc::now() + Duration::seconds(20)],
            Utc::now(),
            payload(1, 222),
        )
        .unwrap();
        let doomed = store.create(gone).await.unwrap();
        let survivor = store.create(kept).await.unwrap();

        let removed = store.delete_where(|p| p.channel_id == 111).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, doomed.id);
        assert!(store.get(survivor.id).await.is_some());
    }

    #[tokio::test]
    async fn list_by_orders_and_bounds() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        for offset in [50, 10, 30, 20, 40] {
            store.create(draft(offset, 1)).await.unwrap();
        }
        store.create(draft(5, 2)).await.unwrap();

        let listed = store.list_by("blast", 1, 3).await;
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].expires <= w[1].expires));
        assert!(listed.iter().all(|r| r.payload.author_id == 1));
    }

    #[tokio::test]
    async fn count_by_filters_author() {
        let tmp = TempDir::new().unwrap();
        let store = TimerStore::new(tmp.path().join("timers"));

        store.create(draft(10, 1)).await.unwrap();
        store.create(draft(20, 1)).await.unwrap();
        store.create(draft(30, 2)).await.unwrap();

        assert_eq!(store.count_by("blast", 1).await, 2);
        assert_eq!(store.count_by("blast", 2).await, 1);
        assert_eq!(store.count_by("other", 1).await, 0);
    }

    #[tokio::test]
    async fn load_recovers_records_and_id_counter() {
        let tmp = TempDir::new().unwrap();

        {
            let store = TimerStore::new(tmp.path().join("timers"));
            store.create(draft(10, 1)).await.unwrap();
            store.create(draft(20, 1)).await.unwrap();
        }

        let store = TimerStore::new(tmp.path().join("timers"));
        let result = store.load().await.unwrap();
        assert_eq!(result.loaded, 2);
        assert!(store.get(1).await.is_some());
        assert!(store.get(2).await.is_some());

        // Counter continues past the recovered maximum
        let next = store.create(draft(30, 1)).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn payload_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let original = TimerPayload {
            message: "remember: 'quote' -c weird .,!".to_string(),
            channel_id: u64::MAX,
            author_id: 0,
            origin_message_id: 123_456_789,
        };

        {
            let store = TimerStore::new(tmp.path().join("timers"));
            let d = TimerDraft::new(
                "blast",
                vec![Utc::now() + Duration::seconds(10)],
                Utc::now(),
                original.clone(),
            )
            .unwrap();
            store.create(d).await.unwrap();
        }

        let store = TimerStore::new(tmp.path().join("timers"));
        store.load().await.unwrap();
        assert_eq!(store.get(1).await.unwrap().payload, original);
    }
}
