//! Resumable learning-session progress.
//!
//! A session moves through `video → response → analysis → complete` for each
//! segment. [`SessionProgress`] keeps the live position in memory and writes
//! checkpoints to a [`ProgressStorage`]: timestamp updates are debounced to
//! the autosave interval, segment and phase changes are written at once, and
//! lifecycle events (unload, tab hidden) force a write.

mod session;
mod storage;

pub use session::{LifecycleEvent, SessionProgress};
pub use storage::{FileStorage, MemoryStorage, ProgressStorage, StorageError};

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Video,
    Response,
    Analysis,
    Complete,
}

impl Phase {
    /// The following phase. `Complete` is terminal.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Video => Self::Response,
            Self::Response => Self::Analysis,
            Self::Analysis | Self::Complete => Self::Complete,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Response => "response",
            Self::Analysis => "analysis",
            Self::Complete => "complete",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(Self::Video),
            "response" => Some(Self::Response),
            "analysis" => Some(Self::Analysis),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one session: (cycle, day, part).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub cycle_id: String,
    pub day_id: String,
    pub part_id: String,
}

impl SessionKey {
    pub fn new(cycle_id: impl Into<String>, day_id: impl Into<String>, part_id: impl Into<String>) -> Self {
        Self { cycle_id: cycle_id.into(), day_id: day_id.into(), part_id: part_id.into() }
    }

    /// Report key for a zero-based segment index: `<cycle>-<day>-<part>-<index+1>`.
    #[must_use]
    pub fn report_key(&self, segment_index: usize) -> String {
        format!("{self}-{}", segment_index + 1)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.cycle_id, self.day_id, self.part_id)
    }
}

/// One persisted checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub cycle_id: String,
    pub day_id: String,
    pub part_id: String,
    pub segment_index: usize,
    pub video_timestamp: f64,
    pub phase: Phase,
    /// Milliseconds since the Unix epoch.
    pub last_updated: i64,
}

impl SessionRecord {
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.cycle_id.clone(), self.day_id.clone(), self.part_id.clone())
    }

    #[must_use]
    pub fn matches(&self, key: &SessionKey) -> bool {
        self.cycle_id == key.cycle_id && self.day_id == key.day_id && self.part_id == key.part_id
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
