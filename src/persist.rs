//! Progress snapshot persistence
//!
//! One logical slot holds the active tour's snapshot. The engine writes
//! through the [`ProgressStore`] trait after every progress-changing
//! operation; durability is best-effort and a failed write never rolls
//! back in-memory state.
//!
//! The snapshot carries the progress aggregate plus the tour id; tour
//! reference data is immutable content and is re-bound from the caller's
//! catalog on restore instead of being serialized.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::TourMode;
use crate::progress::UserProgress;

/// Current snapshot schema version
///
/// Bumped on incompatible shape changes; snapshots with an unknown
/// version are discarded on load rather than failing startup.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of an active tour run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTour {
    pub version: u32,
    pub tour_id: Uuid,
    pub mode: TourMode,
    pub progress: UserProgress,
}

impl SavedTour {
    pub fn new(progress: UserProgress) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tour_id: progress.tour_id,
            mode: progress.mode,
            progress,
        }
    }
}

/// Storage collaborator contract for the active-tour slot
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Overwrite the slot with a new snapshot
    async fn save(&self, snapshot: &SavedTour) -> Result<()>;

    /// Read the slot, `None` when empty
    async fn load(&self) -> Result<Option<SavedTour>>;

    /// Empty the slot
    async fn clear(&self) -> Result<()>;
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<SavedTour>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn save(&self, snapshot: &SavedTour) -> Result<()> {
        *self.slot.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<SavedTour>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

/// JSON file store
///
/// Writes are atomic: serialize to a sibling temp file, then rename over
/// the slot path, so a crash mid-write leaves the previous snapshot
/// intact rather than a truncated file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }
}

#[async_trait]
impl ProgressStore for JsonFileStore {
    async fn save(&self, snapshot: &SavedTour) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<SavedTour>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence(format!(
                "clear {}: {e}",
                self.path.display()
            ))),
        }
    }
}
