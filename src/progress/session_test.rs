use super::*;
use crate::progress::{MemoryStorage, StorageError};
use crate::test_support::settle;
use serde_json::json;

const AUTOSAVE: Duration = Duration::from_secs(5);

fn key() -> SessionKey {
    SessionKey::new("c1", "d3", "p2")
}

fn open(storage: &Arc<MemoryStorage>) -> SessionProgress {
    SessionProgress::open(key(), storage.clone(), AUTOSAVE)
}

/// Single-slot store that hands back whatever was saved last, whatever key
/// is asked for.
#[derive(Default)]
struct SingleSlot(Mutex<Option<SessionRecord>>);

impl ProgressStorage for SingleSlot {
    fn save_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        *self.0.lock().expect("lock") = Some(record.clone());
        Ok(())
    }
    fn load_session(&self, _key: &SessionKey) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.0.lock().expect("lock").clone())
    }
    fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        Ok(self.0.lock().expect("lock").clone().into_iter().collect())
    }
    fn completed_segments(&self, _key: &SessionKey) -> Result<BTreeSet<String>, StorageError> {
        Ok(BTreeSet::new())
    }
    fn mark_segment_complete(&self, _key: &SessionKey, _segment_id: &str) -> Result<bool, StorageError> {
        Ok(true)
    }
    fn save_report(&self, _report_key: &str, _report: &Value) -> Result<(), StorageError> {
        Ok(())
    }
    fn load_report(&self, _report_key: &str) -> Result<Option<Value>, StorageError> {
        Ok(None)
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_timestamp_updates_coalesce_into_one_write_at_boundary() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);

    for (i, ts) in [1.0, 2.5, 3.0, 4.75].into_iter().enumerate() {
        tokio::time::sleep(Duration::from_millis(900)).await;
        progress.update_video_timestamp(ts);
        assert_eq!(progress.video_timestamp(), ts, "update {i} is visible in memory");
    }
    assert!(storage.session_writes().is_empty());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    settle().await;
    let writes = storage.session_writes();
    assert_eq!(writes.len(), 1);
    assert!((writes[0].video_timestamp - 4.75).abs() < f64::EPSILON);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(storage.session_writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn update_after_quiet_interval_persists_immediately() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);

    tokio::time::sleep(Duration::from_secs(6)).await;
    progress.update_video_timestamp(61.0);
    assert_eq!(storage.session_writes().len(), 1);

    progress.update_video_timestamp(62.0);
    assert_eq!(storage.session_writes().len(), 1);
    tokio::time::sleep(AUTOSAVE).await;
    settle().await;
    assert_eq!(storage.session_writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn non_finite_timestamps_are_ignored() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    tokio::time::sleep(Duration::from_secs(6)).await;
    progress.update_video_timestamp(30.0);

    for ts in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        progress.update_video_timestamp(ts);
    }
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;

    assert!((progress.video_timestamp() - 30.0).abs() < f64::EPSILON);
    let writes = storage.session_writes();
    assert_eq!(writes.len(), 1);
    assert!(writes.iter().all(|w| w.video_timestamp.is_finite()));
}

#[tokio::test(start_paused = true)]
async fn set_segment_checkpoints_at_once_and_cancels_debounce() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    progress.update_video_timestamp(12.0);
    progress.set_phase(Phase::Response);
    progress.set_segment(3);

    let writes = storage.session_writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].segment_index, 3);
    assert!(writes[1].video_timestamp.abs() < f64::EPSILON);
    assert_eq!(writes[1].phase, Phase::Video);

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(storage.session_writes().len(), 2);
}

#[tokio::test]
async fn matching_checkpoint_is_resumed() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let progress = open(&storage);
        progress.set_segment(2);
        progress.set_phase(Phase::Analysis);
    }
    let resumed = open(&storage);
    assert_eq!(resumed.segment_index(), 2);
    assert_eq!(resumed.phase(), Phase::Analysis);
}

#[tokio::test]
async fn mismatched_checkpoint_is_never_adopted() {
    let slot = Arc::new(SingleSlot::default());
    slot.save_session(&SessionRecord {
        cycle_id: "c1".to_owned(),
        day_id: "d3".to_owned(),
        part_id: "other".to_owned(),
        segment_index: 4,
        video_timestamp: 99.0,
        phase: Phase::Analysis,
        last_updated: 1,
    })
    .expect("seed");

    let progress = SessionProgress::open(key(), slot, AUTOSAVE);
    assert_eq!(progress.segment_index(), 0);
    assert!(progress.video_timestamp().abs() < f64::EPSILON);
    assert_eq!(progress.phase(), Phase::Video);
}

#[tokio::test]
async fn advance_phase_walks_to_complete() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    assert_eq!(progress.advance_phase(), Phase::Response);
    assert_eq!(progress.advance_phase(), Phase::Analysis);
    assert_eq!(progress.advance_phase(), Phase::Complete);
    assert_eq!(progress.advance_phase(), Phase::Complete);
    assert_eq!(storage.session_writes().last().map(|r| r.phase), Some(Phase::Complete));
}

#[tokio::test]
async fn segment_completion_is_idempotent() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    assert!(progress.complete_segment("seg-a"));
    assert!(!progress.complete_segment("seg-a"));
    assert!(progress.check_segment_complete("seg-a"));
    assert!(!progress.check_segment_complete("seg-b"));
    assert_eq!(progress.completed_segments().len(), 1);
}

#[tokio::test]
async fn reports_use_one_based_composite_keys() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    progress.save_report(0, &json!({"score": 8}));
    assert_eq!(storage.load_report("c1-d3-p2-1").expect("load"), Some(json!({"score": 8})));
    assert_eq!(progress.get_report(0), Some(json!({"score": 8})));
    assert_eq!(progress.get_report(1), None);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_flush_unless_complete() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    progress.update_video_timestamp(7.0);
    progress.handle_lifecycle(LifecycleEvent::VisibilityHidden);
    let writes = storage.session_writes();
    assert_eq!(writes.len(), 1);
    assert!((writes[0].video_timestamp - 7.0).abs() < f64::EPSILON);

    progress.set_phase(Phase::Complete);
    progress.handle_lifecycle(LifecycleEvent::BeforeUnload);
    assert_eq!(storage.session_writes().len(), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(storage.session_writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_flushes_unsaved_position() {
    let storage = Arc::new(MemoryStorage::new());
    let progress = open(&storage);
    progress.update_video_timestamp(33.0);
    drop(progress);

    let writes = storage.session_writes();
    assert_eq!(writes.len(), 1);
    assert!((writes[0].video_timestamp - 33.0).abs() < f64::EPSILON);

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(storage.session_writes().len(), 1);
}
