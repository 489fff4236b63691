use crate::domain::{MediaItem, PlaybackQueue};
use crate::error::QueueStoreError;
use crate::fsutil::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u8 = 1;

/// Durable slots, one file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSlot {
    Main,
    Automix,
}

impl QueueSlot {
    pub fn name(self) -> &'static str {
        match self {
            QueueSlot::Main => "main-queue",
            QueueSlot::Automix => "automix-queue",
        }
    }

    fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

/// On-disk record of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedQueueSnapshot {
    pub version: u8,
    pub title: Option<String>,
    pub items: Vec<MediaItem>,
    pub index: usize,
    pub position_ms: u64,
    #[serde(default)]
    pub saved_at_epoch_ms: i64,
}

impl PersistedQueueSnapshot {
    pub fn new(title: Option<String>, items: Vec<MediaItem>, index: usize, position_ms: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            title,
            items,
            index,
            position_ms,
            saved_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Captures `queue` with the live engine position.
    pub fn from_queue(queue: &PlaybackQueue, position_ms: u64) -> Self {
        Self::new(
            queue.title.clone(),
            queue.items.clone(),
            queue.current_index,
            position_ms,
        )
    }

    pub fn from_items(items: &[MediaItem]) -> Self {
        Self::new(None, items.to_vec(), 0, 0)
    }

    pub fn into_queue(self) -> PlaybackQueue {
        PlaybackQueue::new(self.title, self.items).starting_at(self.index, self.position_ms)
    }
}

/// What startup found on disk. Each slot is independent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RestoredQueues {
    pub main: Option<PlaybackQueue>,
    pub automix: Option<Vec<MediaItem>>,
}

#[derive(Debug, Clone)]
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.to_path_buf(),
        }
    }

    pub fn slot_path(&self, slot: QueueSlot) -> PathBuf {
        self.dir.join(slot.file_name())
    }

    pub fn save(&self, slot: QueueSlot, snapshot: &PersistedQueueSnapshot) -> Result<(), QueueStoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.slot_path(slot), &bytes)?;
        Ok(())
    }

    pub fn load(&self, slot: QueueSlot) -> Result<PersistedQueueSnapshot, QueueStoreError> {
        let bytes = fs::read(self.slot_path(slot))?;
        let snapshot: PersistedQueueSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(QueueStoreError::IncompatibleVersion {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Reads a slot, treating any failure as "nothing saved".
    pub fn load_or_none(&self, slot: QueueSlot) -> Option<PersistedQueueSnapshot> {
        match self.load(slot) {
            Ok(snapshot) => Some(snapshot),
            Err(e) if e.is_missing() => {
                tracing::debug!(slot = slot.name(), "no saved queue");
                None
            }
            Err(e) => {
                tracing::warn!(slot = slot.name(), err = %e, "discarding unreadable queue snapshot");
                None
            }
        }
    }

    pub fn restore(&self) -> RestoredQueues {
        let main = self
            .load_or_none(QueueSlot::Main)
            .map(PersistedQueueSnapshot::into_queue)
            .filter(|q| !q.is_empty());
        let automix = self
            .load_or_none(QueueSlot::Automix)
            .map(|s| s.items)
            .filter(|items| !items.is_empty());
        RestoredQueues { main, automix }
    }

    /// Writes both slots off the async executor. A failure in one slot
    /// does not skip the other.
    pub async fn save_all_async(
        &self,
        main: PersistedQueueSnapshot,
        automix: PersistedQueueSnapshot,
    ) -> Result<(), QueueStoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let main_res = store.save(QueueSlot::Main, &main);
            let automix_res = store.save(QueueSlot::Automix, &automix);
            main_res.and(automix_res)
        })
        .await?
    }

    pub async fn restore_async(&self) -> Result<RestoredQueues, QueueStoreError> {
        let store = self.clone();
        Ok(tokio::task::spawn_blocking(move || store.restore()).await?)
    }
}
