use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::{HistoryEntry, RateSet, RateSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::fs_util::{read_json, write_json_atomic};

/// File-backed rate cache: one snapshot document plus an append-only history.
///
/// ```text
/// data/
///   rates.json            {"pairs": {...}, "last_refresh": "..."}
///   exchange_rates.json   [{"id": "...", "from_currency": ...}, ...]
/// ```
///
/// Both files are replaced via temp-file + rename. A single writer is assumed.
pub struct RateStore {
    snapshot_path: PathBuf,
    history_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl RateStore {
    pub fn new(snapshot_path: impl AsRef<Path>, history_path: impl AsRef<Path>) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
            history_path: history_path.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current snapshot, or `None` if no update has ever been written.
    pub async fn load_snapshot(&self) -> Result<Option<RateSnapshot>> {
        read_json(&self.snapshot_path).await
    }

    /// Full history; empty when the file is missing or blank.
    ///
    /// Unparseable history is an error. The file is never reset automatically.
    pub async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        let entries: Option<Vec<HistoryEntry>> = read_json(&self.history_path)
            .await
            .context("History file is corrupt; fix or remove it before updating rates")?;
        Ok(entries.unwrap_or_default())
    }

    pub async fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        self.append_history_batch(std::slice::from_ref(entry)).await
    }

    /// Appends `entries` in one read-append-replace pass.
    ///
    /// Existing history is validated even when `entries` is empty, so a
    /// corrupt file stops the cycle before the snapshot is touched.
    pub async fn append_history_batch(&self, entries: &[HistoryEntry]) -> Result<()> {
        let mut history = self.load_history().await?;
        if entries.is_empty() {
            return Ok(());
        }

        history.extend_from_slice(entries);
        write_json_atomic(&self.history_path, &history).await?;

        debug!(
            path = %self.history_path.display(),
            appended = entries.len(),
            total = history.len(),
            "History appended"
        );
        Ok(())
    }

    /// Replaces the snapshot with `pairs`, stamped with the current time.
    ///
    /// Nothing from the previous snapshot is carried over.
    pub async fn replace_snapshot(&self, pairs: RateSet) -> Result<RateSnapshot> {
        let snapshot = RateSnapshot::new(pairs, self.clock.now());
        write_json_atomic(&self.snapshot_path, &snapshot).await?;

        debug!(
            path = %self.snapshot_path.display(),
            pairs = snapshot.pairs.len(),
            "Snapshot replaced"
        );
        Ok(snapshot)
    }

    /// Keeps the previous pairs and `last_refresh`, only stamping `last_attempt`.
    ///
    /// Without a previous snapshot this writes an empty one.
    pub async fn record_attempt(&self) -> Result<RateSnapshot> {
        let now = self.clock.now();
        let snapshot = match self.load_snapshot().await? {
            Some(mut previous) => {
                previous.last_attempt = Some(now);
                previous
            }
            None => RateSnapshot {
                pairs: RateSet::new(),
                last_refresh: now,
                last_attempt: Some(now),
            },
        };
        write_json_atomic(&self.snapshot_path, &snapshot).await?;
        Ok(snapshot)
    }
}
