//! Backing stores for session checkpoints, completed segments and reports.
//!
//! Both stores hold the same [`StoreData`] document. [`FileStorage`] keeps it
//! as one JSON file and replaces it atomically on every write.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{SessionKey, SessionRecord};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("progress store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("progress store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent key-value store behind [`SessionProgress`](super::SessionProgress).
///
/// Calls are synchronous and short; implementations must be safe to share
/// across tasks.
pub trait ProgressStorage: Send + Sync {
    /// Write the checkpoint for the record's own session key.
    fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    fn load_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError>;

    /// Every stored checkpoint, ordered by session key.
    fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError>;

    fn completed_segments(&self, key: &SessionKey) -> Result<BTreeSet<String>, StorageError>;

    /// Add `segment_id` to the completed set. Returns `false` when it was
    /// already there.
    fn mark_segment_complete(&self, key: &SessionKey, segment_id: &str) -> Result<bool, StorageError>;

    /// Store (or overwrite) the analysis report under `report_key`.
    fn save_report(&self, report_key: &str, report: &Value) -> Result<(), StorageError>;

    fn load_report(&self, report_key: &str) -> Result<Option<Value>, StorageError>;
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// `cycle → day → part → T`. Ids may contain any character, so the triple is
/// never flattened into one string key.
type ByKey<T> = BTreeMap<String, BTreeMap<String, BTreeMap<String, T>>>;

fn slot<'a, T>(map: &'a ByKey<T>, key: &SessionKey) -> Option<&'a T> {
    map.get(&key.cycle_id)?.get(&key.day_id)?.get(&key.part_id)
}

fn slot_mut<'a, T: Default>(map: &'a mut ByKey<T>, key: &SessionKey) -> &'a mut T {
    map.entry(key.cycle_id.clone())
        .or_default()
        .entry(key.day_id.clone())
        .or_default()
        .entry(key.part_id.clone())
        .or_default()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    sessions: ByKey<SessionRecord>,
    #[serde(default)]
    completed: ByKey<BTreeSet<String>>,
    #[serde(default)]
    reports: BTreeMap<String, Value>,
}

impl StoreData {
    /// A non-finite timestamp would serialize as `null` and make the whole
    /// document unreadable, so it is stored as 0.
    fn put_session(&mut self, record: &SessionRecord) {
        let mut record = record.clone();
        if !record.video_timestamp.is_finite() {
            record.video_timestamp = 0.0;
        }
        self.sessions
            .entry(record.cycle_id.clone())
            .or_default()
            .entry(record.day_id.clone())
            .or_default()
            .insert(record.part_id.clone(), record);
    }

    fn session(&self, key: &SessionKey) -> Option<SessionRecord> {
        slot(&self.sessions, key).filter(|r| r.matches(key)).cloned()
    }

    fn all_sessions(&self) -> Vec<SessionRecord> {
        self.sessions
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .cloned()
            .collect()
    }

    fn completed(&self, key: &SessionKey) -> BTreeSet<String> {
        slot(&self.completed, key).cloned().unwrap_or_default()
    }

    fn mark(&mut self, key: &SessionKey, segment_id: &str) -> bool {
        slot_mut(&mut self.completed, key).insert(segment_id.to_owned())
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-process store. Also counts checkpoint writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<StoreData>,
    session_writes: Mutex<Vec<SessionRecord>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every checkpoint written so far, oldest first.
    #[must_use]
    pub fn session_writes(&self) -> Vec<SessionRecord> {
        self.session_writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ProgressStorage for MemoryStorage {
    fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.data().put_session(record);
        self.session_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn load_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.data().session(key))
    }

    fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        Ok(self.data().all_sessions())
    }

    fn completed_segments(&self, key: &SessionKey) -> Result<BTreeSet<String>, StorageError> {
        Ok(self.data().completed(key))
    }

    fn mark_segment_complete(&self, key: &SessionKey, segment_id: &str) -> Result<bool, StorageError> {
        Ok(self.data().mark(key, segment_id))
    }

    fn save_report(&self, report_key: &str, report: &Value) -> Result<(), StorageError> {
        self.data().reports.insert(report_key.to_owned(), report.clone());
        Ok(())
    }

    fn load_report(&self, report_key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.data().reports.get(report_key).cloned())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// Single JSON file store. Writes go to a sibling temp file that is renamed
/// over the original, so a crash mid-write leaves the previous document.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.clone(), source }
    }

    fn read(&self) -> Result<StoreData, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(StoreData::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreData::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, data: &StoreData) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp, bytes).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn view<R>(&self, f: impl FnOnce(&StoreData) -> R) -> Result<R, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&self.read()?))
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreData) -> R) -> Result<R, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut data = self.read()?;
        let out = f(&mut data);
        self.write(&data)?;
        Ok(out)
    }
}

impl ProgressStorage for FileStorage {
    fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.update(|d| d.put_session(record))
    }

    fn load_session(&self, key: &SessionKey) -> Result<Option<SessionRecord>, StorageError> {
        self.view(|d| d.session(key))
    }

    fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        self.view(StoreData::all_sessions)
    }

    fn completed_segments(&self, key: &SessionKey) -> Result<BTreeSet<String>, StorageError> {
        self.view(|d| d.completed(key))
    }

    fn mark_segment_complete(&self, key: &SessionKey, segment_id: &str) -> Result<bool, StorageError> {
        self.update(|d| d.mark(key, segment_id))
    }

    fn save_report(&self, report_key: &str, report: &Value) -> Result<(), StorageError> {
        self.update(|d| {
            d.reports.insert(report_key.to_owned(), report.clone());
        })
    }

    fn load_report(&self, report_key: &str) -> Result<Option<Value>, StorageError> {
        self.view(|d| d.reports.get(report_key).cloned())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
