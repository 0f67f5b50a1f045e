//! JSON-file storage adapter

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{GlobalLock, TimerSnapshot, TimerStore};

const SNAPSHOT_FILE: &str = "timers.json";
const LOCK_FILE: &str = "lock.json";

/// Default `TimerStore` adapter: two JSON documents in a data directory.
///
/// Unreadable or malformed documents are treated as absent (with a warning)
/// rather than as errors - a corrupt file must never prevent the engine from
/// starting a fresh session.
pub struct FileTimerStore {
    snapshot_path: PathBuf,
    lock_path: PathBuf,
}

impl FileTimerStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        Ok(Self {
            snapshot_path: data_dir.join(SNAPSHOT_FILE),
            lock_path: data_dir.join(LOCK_FILE),
        })
    }

    fn read_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(
                    "Malformed document at {}: {}. Discarding it.",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<()> {
        let raw = serde_json::to_string(document)
            .with_context(|| format!("failed to serialize {}", path.display()))?;
        fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn remove_document(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

impl TimerStore for FileTimerStore {
    fn load_snapshot(&self) -> Result<Option<TimerSnapshot>> {
        Ok(Self::read_document(&self.snapshot_path))
    }

    fn save_snapshot(&self, snapshot: &TimerSnapshot) -> Result<()> {
        Self::write_document(&self.snapshot_path, snapshot)
    }

    fn clear_snapshot(&self) -> Result<()> {
        Self::remove_document(&self.snapshot_path)
    }

    fn load_lock(&self) -> Result<Option<GlobalLock>> {
        Ok(Self::read_document(&self.lock_path))
    }

    fn save_lock(&self, lock: &GlobalLock) -> Result<()> {
        Self::write_document(&self.lock_path, lock)
    }

    fn clear_lock(&self) -> Result<()> {
        Self::remove_document(&self.lock_path)
    }
}
