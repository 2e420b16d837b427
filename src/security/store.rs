//! Shared counter storage for the rate limiter.
//!
//! # Responsibilities
//! - Define the storage port the limiter talks to (`RateLimitStore`)
//! - Provide an in-process implementation backed by `DashMap`
//! - Snapshot the in-process map to disk so counters survive restarts
//!
//! # Design Decisions
//! - The port is deliberately small: get, put, delete-by-predicate, list
//! - No compare-and-swap: the limiter's read-then-write is an accepted approximation
//! - A distributed backend only needs to implement the trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// One fixed-window counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    /// `prefix:identifier`, or the bare identifier when the prefix is empty.
    pub key: String,
    /// Requests observed in the current window.
    pub count: u32,
    /// When the current window began.
    pub window_start: DateTime<Utc>,
    /// When the current window ends.
    pub expires_at: DateTime<Utc>,
}

impl RateLimitRecord {
    /// A fresh window holding a single request.
    pub fn first(key: impl Into<String>, now: DateTime<Utc>, window: chrono::Duration) -> Self {
        Self {
            key: key.into(),
            count: 1,
            window_start: now,
            expires_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file is not valid JSON.
    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Predicate passed to [`RateLimitStore::delete_where`].
pub type RecordPredicate<'a> = &'a (dyn Fn(&RateLimitRecord) -> bool + Send + Sync);

/// Storage port for rate limit counters.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Fetch the record stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<RateLimitRecord>>;

    /// Insert or overwrite the record under `record.key`.
    async fn put(&self, record: RateLimitRecord) -> StoreResult<()>;

    /// Remove every record matching `predicate`. Returns how many were removed.
    async fn delete_where(&self, predicate: RecordPredicate<'_>) -> StoreResult<usize>;

    /// All records currently held, in no particular order.
    async fn list(&self) -> StoreResult<Vec<RateLimitRecord>>;
}

/// In-process store for single-instance deployments.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, RateLimitRecord>>,
    persistence_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Create a store and seed it from the snapshot at `path`, if one exists.
    pub fn load_from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, RateLimitRecord> = serde_json::from_reader(reader)?;
            for (key, record) in map {
                store.inner.insert(key, record);
            }
            tracing::info!(
                path = %path.display(),
                records = store.inner.len(),
                "Loaded rate limit snapshot"
            );
        }
        Ok(store)
    }

    /// Write the current counters to the configured snapshot path.
    /// No-op when the store was created without one.
    pub fn save_to_file(&self) -> StoreResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let map: HashMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &map)?;
        writer.flush()?;
        tracing::info!(path = %path.display(), records = map.len(), "Saved rate limit snapshot");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<RateLimitRecord>> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, record: RateLimitRecord) -> StoreResult<()> {
        self.inner.insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete_where(&self, predicate: RecordPredicate<'_>) -> StoreResult<usize> {
        let mut removed = 0;
        self.inner.retain(|_, record| {
            if predicate(record) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn list(&self) -> StoreResult<Vec<RateLimitRecord>> {
        Ok(self.inner.iter().map(|r| r.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = MemoryStore::new(None);
        assert!(store.get("pdf-gen:1.2.3.4").await.unwrap().is_none());

        let mut record = RateLimitRecord::first("pdf-gen:1.2.3.4", at(0), Duration::seconds(60));
        store.put(record.clone()).await.unwrap();
        assert_eq!(store.get("pdf-gen:1.2.3.4").await.unwrap(), Some(record.clone()));

        record.count = 5;
        store.put(record.clone()).await.unwrap();
        assert_eq!(store.get("pdf-gen:1.2.3.4").await.unwrap().unwrap().count, 5);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_where_removes_only_matches() {
        let store = MemoryStore::new(None);
        store
            .put(RateLimitRecord::first("a", at(0), Duration::seconds(10)))
            .await
            .unwrap();
        store
            .put(RateLimitRecord::first("b", at(0), Duration::seconds(100)))
            .await
            .unwrap();

        let now = at(50);
        let removed = store.delete_where(&|r: &RateLimitRecord| r.is_expired(now)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_snapshot_persistence() {
        let path = std::env::temp_dir().join(format!("folio-guard-snapshot-{}.json", uuid::Uuid::new_v4()));

        let store = MemoryStore::new(Some(path.clone()));
        store
            .put(RateLimitRecord::first("share-link:9.9.9.9", at(0), Duration::seconds(60)))
            .await
            .unwrap();
        store.save_to_file().unwrap();

        let loaded = MemoryStore::load_from_file(&path).unwrap();
        let record = loaded.get("share-link:9.9.9.9").await.unwrap().unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.expires_at, at(60));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_snapshot_write_failure_is_reported() {
        let path = PathBuf::from("/dev/full");
        if !path.exists() {
            return;
        }

        let store = MemoryStore::new(Some(path));
        store
            .put(RateLimitRecord::first("pdf-gen:1.2.3.4", at(0), Duration::seconds(60)))
            .await
            .unwrap();

        assert!(matches!(store.save_to_file(), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_load_missing_snapshot_is_empty() {
        let path = std::env::temp_dir().join(format!("folio-guard-missing-{}.json", uuid::Uuid::new_v4()));
        let store = MemoryStore::load_from_file(&path).unwrap();
        assert!(store.is_empty());
    }
}
