//! Durable keyed storage for holding records.
//!
//! Every record carries a version number. Writers read a record, compute its
//! successor, then [`LedgerStore::commit`] with the version they read; the
//! store rejects the write if anyone else committed in between. This gives
//! all-or-nothing updates without in-process locks spanning the
//! read-compute-write cycle.
//!
//! Versions come from one counter per store and never repeat, so a record
//! that is deleted and re-created cannot match a version read before the
//! delete.

use crate::types::{Holding, HoldingKey};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use fs4::fs_std::FileExt;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

/// A stored value with its optimistic-concurrency version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Result of a compare-and-swap commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The write (or delete) was applied.
    Applied,
    /// The record changed since it was read; nothing was written.
    Conflict,
}

/// Transactional storage for holdings, keyed by (owner, ticker).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetch one record, including logically deleted ones.
    async fn get(&self, key: &HoldingKey) -> Result<Option<Versioned<Holding>>>;

    /// All records of an owner, including logically deleted ones.
    async fn list(&self, owner: &str) -> Result<Vec<Holding>>;

    /// Replace the record at `key` with `next` (or delete it when `None`),
    /// provided its current version equals `expected` (`None` = absent).
    async fn commit(
        &self,
        key: &HoldingKey,
        expected: Option<u64>,
        next: Option<Holding>,
    ) -> Result<Commit>;
}

/// Live records plus the highest version ever issued.
#[derive(Debug, Default)]
struct Records {
    entries: HashMap<HoldingKey, Versioned<Holding>>,
    last_version: u64,
}

impl Records {
    /// Apply a compare-and-swap.
    fn commit(&mut self, key: &HoldingKey, expected: Option<u64>, next: Option<Holding>) -> Commit {
        let current = self.entries.get(key).map(|r| r.version);
        if current != expected {
            return Commit::Conflict;
        }

        match next {
            Some(value) => {
                self.last_version += 1;
                let version = self.last_version;
                self.entries.insert(key.clone(), Versioned { version, value });
            }
            None => {
                self.entries.remove(key);
            }
        }
        Commit::Applied
    }
}

fn owned_by(records: &Records, owner: &str) -> Vec<Holding> {
    records
        .entries
        .iter()
        .filter(|(key, _)| key.owner == owner)
        .map(|(_, record)| record.value.clone())
        .collect()
}

/// Non-persistent store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records, including logically deleted ones.
    pub async fn len(&self) -> usize {
        self.records.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.entries.is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get(&self, key: &HoldingKey) -> Result<Option<Versioned<Holding>>> {
        Ok(self.records.read().await.entries.get(key).cloned())
    }

    async fn list(&self, owner: &str) -> Result<Vec<Holding>> {
        Ok(owned_by(&*self.records.read().await, owner))
    }

    async fn commit(
        &self,
        key: &HoldingKey,
        expected: Option<u64>,
        next: Option<Holding>,
    ) -> Result<Commit> {
        Ok(self.records.write().await.commit(key, expected, next))
    }
}

/// On-disk layout of [`JsonFileStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    last_version: u64,
    records: Vec<Versioned<Holding>>,
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Store persisted as a single JSON document.
///
/// Each operation re-reads the file, and writes go through a uniquely named
/// temporary file renamed into place so a crash never leaves a half-written
/// document. Commits hold an exclusive lock on a `.lock` file next to the
/// document, which serializes writers across store instances and processes.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Block until this process holds the exclusive commit lock. The lock is
    /// released when the returned file is dropped.
    async fn lock_exclusive(&self) -> Result<File> {
        self.ensure_parent().await?;
        let lock_path = self.sibling(".lock");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| Error::Storage(format!("lock task failed: {}", e)))??;
        Ok(file)
    }

    async fn load(&self) -> Result<Records> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Records::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Records::default());
        }

        let file: StoreFile = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e)))?;

        // Files written before the counter was persisted only know live versions
        let newest = file.records.iter().map(|r| r.version).max().unwrap_or(0);
        Ok(Records {
            last_version: file.last_version.max(newest),
            entries: file
                .records
                .into_iter()
                .map(|record| (record.value.key(), record))
                .collect(),
        })
    }

    async fn save(&self, records: &Records) -> Result<()> {
        self.ensure_parent().await?;

        let mut sorted: Vec<_> = records.entries.values().cloned().collect();
        sorted.sort_by(|a, b| a.value.key().cmp(&b.value.key()));

        let content = serde_json::to_string_pretty(&StoreFile {
            last_version: records.last_version,
            records: sorted,
        })?;
        let tmp = self.sibling(&format!(
            ".{}.{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn get(&self, key: &HoldingKey) -> Result<Option<Versioned<Holding>>> {
        Ok(self.load().await?.entries.remove(key))
    }

    async fn list(&self, owner: &str) -> Result<Vec<Holding>> {
        Ok(owned_by(&self.load().await?, owner))
    }

    async fn commit(
        &self,
        key: &HoldingKey,
        expected: Option<u64>,
        next: Option<Holding>,
    ) -> Result<Commit> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.lock_exclusive().await?;

        let mut records = self.load().await?;
        let outcome = records.commit(key, expected, next);
        if outcome == Commit::Applied {
            self.save(&records).await?;
        }
        Ok(outcome)
    }
}
