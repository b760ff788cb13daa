//! Append-only audit trail of ledger mutations.

use crate::types::Holding;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// What happened to a holding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    Bought,
    Sold,
    /// A sell brought the position to zero shares
    Closed,
    Pinned,
    Unpinned,
}

/// One committed ledger mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEvent {
    pub at: DateTime<Utc>,
    pub kind: LedgerEventKind,
    pub owner: String,
    pub ticker: String,
    /// Signed share change (zero for pin changes)
    pub share_delta: i64,
    /// Trade price, for buys and sells
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Record state after the mutation; absent when it was removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holding: Option<Holding>,
}

/// Receiver notified after each committed mutation.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &LedgerEvent) -> Result<()>;
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for Box<T> {
    async fn record(&self, event: &LedgerEvent) -> Result<()> {
        (**self).record(event).await
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn record(&self, _event: &LedgerEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: StdMutex<Vec<LedgerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn record(&self, event: &LedgerEvent) -> Result<()> {
        // A panic elsewhere while holding the lock leaves the Vec intact
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl EventSink for JsonLinesSink {
    async fn record(&self, event: &LedgerEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
