//! Live position of one learning session plus its checkpoint policy.
//!
//! WRITE POLICY
//! ============
//! - `update_video_timestamp`: memory at once, storage at most once per
//!   autosave interval. Updates inside the window coalesce into one write at
//!   the window boundary carrying the latest timestamp.
//! - `set_segment`, `set_phase`, `advance_phase`: written immediately, and any
//!   pending debounced write is cancelled.
//! - `handle_lifecycle` and `Drop`: written immediately unless the session is
//!   complete.
//!
//! Storage failures are logged and never surface to the caller.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Phase, ProgressStorage, SessionKey, SessionRecord, now_millis};

/// Host events that must not lose progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The process or page is about to go away.
    BeforeUnload,
    /// The session moved to the background.
    VisibilityHidden,
}

pub struct SessionProgress {
    shared: Arc<Shared>,
}

struct Shared {
    key: SessionKey,
    storage: Arc<dyn ProgressStorage>,
    autosave: Duration,
    state: Mutex<State>,
}

struct State {
    segment_index: usize,
    video_timestamp: f64,
    phase: Phase,
    last_persisted_at: Instant,
    pending: Option<(u64, JoinHandle<()>)>,
    next_pending: u64,
}

impl SessionProgress {
    /// Open `key`, resuming the stored checkpoint only if it belongs to the
    /// same (cycle, day, part). Otherwise start at segment 0, timestamp 0,
    /// phase `video`.
    pub fn open(key: SessionKey, storage: Arc<dyn ProgressStorage>, autosave: Duration) -> Self {
        let stored = match storage.load_session(&key) {
            Ok(record) => record.filter(|r| r.matches(&key)),
            Err(e) => {
                warn!(session = %key, error = %e, "progress: failed to load checkpoint, starting fresh");
                None
            }
        };
        let (segment_index, video_timestamp, phase) = match &stored {
            Some(r) => (r.segment_index, r.video_timestamp, r.phase),
            None => (0, 0.0, Phase::Video),
        };
        debug!(session = %key, resumed = stored.is_some(), segment_index, %phase, "progress: opened");

        Self {
            shared: Arc::new(Shared {
                key,
                storage,
                autosave,
                state: Mutex::new(State {
                    segment_index,
                    video_timestamp,
                    phase,
                    last_persisted_at: Instant::now(),
                    pending: None,
                    next_pending: 0,
                }),
            }),
        }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.shared.key
    }

    #[must_use]
    pub fn segment_index(&self) -> usize {
        self.shared.lock().segment_index
    }

    #[must_use]
    pub fn video_timestamp(&self) -> f64 {
        self.shared.lock().video_timestamp
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Current in-memory position as a record.
    #[must_use]
    pub fn snapshot(&self) -> SessionRecord {
        self.shared.record(&self.shared.lock())
    }

    /// Record playback position. Persisted now if the autosave interval has
    /// passed since the last write, otherwise at the interval boundary.
    /// Non-finite positions are ignored.
    pub fn update_video_timestamp(&self, timestamp: f64) {
        if !timestamp.is_finite() {
            warn!(session = %self.shared.key, timestamp, "progress: ignoring non-finite video timestamp");
            return;
        }
        let mut state = self.shared.lock();
        state.video_timestamp = timestamp;
        cancel_pending(&mut state);

        let due = state.last_persisted_at + self.shared.autosave;
        if Instant::now() >= due {
            self.shared.persist(&mut state);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.shared.persist(&mut state);
            return;
        };
        state.next_pending = state.next_pending.wrapping_add(1);
        let id = state.next_pending;
        let weak = Arc::downgrade(&self.shared);
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(due).await;
            flush_pending(&weak, id);
        });
        state.pending = Some((id, handle));
    }

    /// Jump to segment `index`, restarting it from the video phase.
    pub fn set_segment(&self, index: usize) {
        let mut state = self.shared.lock();
        state.segment_index = index;
        state.video_timestamp = 0.0;
        state.phase = Phase::Video;
        cancel_pending(&mut state);
        self.shared.persist(&mut state);
    }

    pub fn set_phase(&self, phase: Phase) {
        let mut state = self.shared.lock();
        state.phase = phase;
        cancel_pending(&mut state);
        self.shared.persist(&mut state);
    }

    /// Move to the next phase and persist. Returns the new phase.
    pub fn advance_phase(&self) -> Phase {
        let next = self.phase().next();
        self.set_phase(next);
        next
    }

    /// Mark `segment_id` complete. Returns `true` only the first time.
    pub fn complete_segment(&self, segment_id: &str) -> bool {
        match self.shared.storage.mark_segment_complete(&self.shared.key, segment_id) {
            Ok(added) => added,
            Err(e) => {
                warn!(session = %self.shared.key, segment_id, error = %e, "progress: failed to mark segment complete");
                false
            }
        }
    }

    #[must_use]
    pub fn check_segment_complete(&self, segment_id: &str) -> bool {
        self.completed_segments().contains(segment_id)
    }

    #[must_use]
    pub fn completed_segments(&self) -> BTreeSet<String> {
        self.shared
            .storage
            .completed_segments(&self.shared.key)
            .unwrap_or_else(|e| {
                warn!(session = %self.shared.key, error = %e, "progress: failed to read completed segments");
                BTreeSet::new()
            })
    }

    /// Store the analysis report for zero-based `segment_index`.
    pub fn save_report(&self, segment_index: usize, report: &Value) {
        let report_key = self.shared.key.report_key(segment_index);
        if let Err(e) = self.shared.storage.save_report(&report_key, report) {
            warn!(%report_key, error = %e, "progress: failed to save report");
        }
    }

    #[must_use]
    pub fn get_report(&self, segment_index: usize) -> Option<Value> {
        let report_key = self.shared.key.report_key(segment_index);
        self.shared.storage.load_report(&report_key).unwrap_or_else(|e| {
            warn!(%report_key, error = %e, "progress: failed to load report");
            None
        })
    }

    /// Force a checkpoint unless the session is already complete.
    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        let mut state = self.shared.lock();
        if state.phase == Phase::Complete {
            return;
        }
        cancel_pending(&mut state);
        debug!(session = %self.shared.key, ?event, "progress: lifecycle flush");
        self.shared.persist(&mut state);
    }

    /// Write the current position now, regardless of phase.
    pub fn flush(&self) {
        let mut state = self.shared.lock();
        cancel_pending(&mut state);
        self.shared.persist(&mut state);
    }
}

impl Drop for SessionProgress {
    fn drop(&mut self) {
        self.handle_lifecycle(LifecycleEvent::BeforeUnload);
        cancel_pending(&mut self.shared.lock());
    }
}

fn cancel_pending(state: &mut State) {
    if let Some((_, handle)) = state.pending.take() {
        handle.abort();
    }
}

fn flush_pending(weak: &Weak<Shared>, id: u64) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let mut state = shared.lock();
    if !matches!(state.pending, Some((current, _)) if current == id) {
        return;
    }
    state.pending = None;
    shared.persist(&mut state);
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, state: &State) -> SessionRecord {
        SessionRecord {
            cycle_id: self.key.cycle_id.clone(),
            day_id: self.key.day_id.clone(),
            part_id: self.key.part_id.clone(),
            segment_index: state.segment_index,
            video_timestamp: state.video_timestamp,
            phase: state.phase,
            last_updated: now_millis(),
        }
    }

    fn persist(&self, state: &mut State) {
        let record = self.record(state);
        state.last_persisted_at = Instant::now();
        if let Err(e) = self.storage.save_session(&record) {
            warn!(session = %self.key, error = %e, "progress: failed to save checkpoint");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
