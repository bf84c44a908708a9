// AnnouncementQueue — pending set, history ring, and the dispatcher worker.
//
// The dispatcher is a dedicated OS thread (std::thread, not tokio::spawn):
// playback blocks for the length of each file, and blocking work does not
// belong on the async executor. One dispatcher per queue is also the
// serialization mechanism — at most one announcement is ever `playing`.
//
// Locking discipline: the state mutex is held only for O(log n) heap
// operations and bookkeeping. No filesystem or audio I/O happens under it;
// the dispatcher takes what it needs, releases, plays, then re-locks to
// record the terminal transition.

use std::collections::{BinaryHeap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::announcement::{Announcement, AnnouncementStatus};
use crate::audio::AudioSink;
use crate::constants;

/// Errors returned by queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is stopped")]
    Stopped,
    #[error("announcement not found: {id}")]
    NotFound { id: String },
    #[error("cannot cancel announcement in state {status}")]
    CannotCancel { status: AnnouncementStatus },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Point-in-time snapshot of the queue, shaped for the status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStatus {
    pub pending_count: usize,
    pub currently_playing: Option<Announcement>,
    /// Pending items in dispatch order (head first).
    pub pending_items: Vec<Announcement>,
    pub history_count: usize,
    pub is_running: bool,
    pub audio_available: bool,
}

/// Pending-set entry. Orders by (priority desc, scheduled_at asc, insertion
/// seq asc); `BinaryHeap` is a max-heap, so "greater" means "dispatch first".
struct PendingEntry {
    announcement: Announcement,
    seq: u64,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.announcement
            .priority
            .cmp(&other.announcement.priority)
            .then_with(|| {
                other
                    .announcement
                    .scheduled_at
                    .cmp(&self.announcement.scheduled_at)
            })
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    pending: BinaryHeap<PendingEntry>,
    current: Option<Announcement>,
    history: VecDeque<Announcement>,
    next_seq: u64,
    running: bool,
}

struct QueueShared {
    state: Mutex<QueueState>,
    audio_available: bool,
    max_history: usize,
}

/// Priority queue with a single dispatcher worker.
///
/// Dropping the queue without calling [`AnnouncementQueue::stop`] leaves the
/// dispatcher thread running until process exit; callers stop it during
/// orderly shutdown.
pub struct AnnouncementQueue {
    shared: Arc<QueueShared>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl AnnouncementQueue {
    /// Spawn the dispatcher and return the running queue.
    ///
    /// `sink = None` means audio failed to initialize: submissions still
    /// succeed, but dispatched announcements are marked failed and the
    /// status snapshot reports `audio_available: false`.
    pub fn start(
        sink: Option<Box<dyn AudioSink>>,
        max_history: usize,
    ) -> Result<Self, QueueError> {
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                pending: BinaryHeap::new(),
                current: None,
                history: VecDeque::new(),
                next_seq: 0,
                running: true,
            }),
            audio_available: sink.is_some(),
            max_history,
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("dispatcher".into())
                .spawn(move || run_dispatcher(shared, sink))?
        };

        Ok(Self {
            shared,
            handle: Mutex::new(Some(worker)),
        })
    }

    /// Insert an announcement into the pending set.
    ///
    /// Fails only when the queue has been stopped.
    pub fn enqueue(&self, announcement: Announcement) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(QueueError::Stopped);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        debug!(
            id = %announcement.id,
            kind = %announcement.kind,
            priority = %announcement.priority,
            "announcement queued"
        );
        state.pending.push(PendingEntry { announcement, seq });
        Ok(())
    }

    /// Cancel a queued announcement.
    ///
    /// Only items still in the pending set can be cancelled; a playing or
    /// terminal item yields [`QueueError::CannotCancel`]. The cancelled item
    /// moves to the history ring exactly once.
    pub fn cancel(&self, id: &str) -> Result<Announcement, QueueError> {
        let mut state = self.shared.state.lock();

        if let Some(current) = &state.current {
            if current.id == id {
                return Err(QueueError::CannotCancel {
                    status: current.status,
                });
            }
        }

        let mut removed = None;
        state.pending.retain(|entry| {
            if entry.announcement.id == id {
                removed = Some(entry.announcement.clone());
                false
            } else {
                true
            }
        });
        if let Some(mut announcement) = removed {
            announcement.status = AnnouncementStatus::Cancelled;
            announcement.completed_at = Some(Utc::now());
            push_history(&mut state, self.shared.max_history, announcement.clone());
            info!(%id, "announcement cancelled");
            return Ok(announcement);
        }

        if let Some(terminal) = state.history.iter().rev().find(|a| a.id == id) {
            return Err(QueueError::CannotCancel {
                status: terminal.status,
            });
        }

        Err(QueueError::NotFound { id: id.to_string() })
    }

    /// Snapshot the queue for the status endpoint.
    pub fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock();

        let mut pending_items: Vec<Announcement> = state
            .pending
            .iter()
            .map(|entry| entry.announcement.clone())
            .collect();
        pending_items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        QueueStatus {
            pending_count: pending_items.len(),
            currently_playing: state.current.clone(),
            pending_items,
            history_count: state.history.len(),
            is_running: state.running,
            audio_available: self.shared.audio_available,
        }
    }

    /// Newest-first slice of the history ring.
    pub fn history(&self, limit: usize) -> Vec<Announcement> {
        let state = self.shared.state.lock();
        state.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    pub fn audio_available(&self) -> bool {
        self.shared.audio_available
    }

    /// Stop accepting submissions and drain the dispatcher.
    ///
    /// The current announcement (if any) plays to completion; pending items
    /// are abandoned — the queue is deliberately non-durable. Blocks until
    /// the dispatcher thread exits. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("dispatcher thread panicked during shutdown");
            }
        }
        info!("announcement queue stopped");
    }
}

// ---------- Dispatcher worker -----------------------------------------------

enum Step {
    Exit,
    Idle,
    Play(Announcement),
}

fn run_dispatcher(shared: Arc<QueueShared>, mut sink: Option<Box<dyn AudioSink>>) {
    loop {
        let step = {
            let mut state = shared.state.lock();
            if !state.running && state.current.is_none() {
                Step::Exit
            } else if state.current.is_some() {
                // Single worker: only reachable if a caller races stop();
                // hold the slot until the bookkeeping below clears it.
                Step::Idle
            } else {
                // The head holds the slot even when lower-priority items are
                // already due: a future-scheduled high-priority item must
                // play on time, not behind an opportunistic filler.
                let now = Utc::now();
                let head_due = state
                    .pending
                    .peek()
                    .is_some_and(|head| head.announcement.scheduled_at <= now);
                if !head_due {
                    Step::Idle
                } else if let Some(entry) = state.pending.pop() {
                    let mut announcement = entry.announcement;
                    announcement.status = AnnouncementStatus::Playing;
                    announcement.started_at = Some(now);
                    state.current = Some(announcement.clone());
                    Step::Play(announcement)
                } else {
                    Step::Idle
                }
            }
        };

        match step {
            Step::Exit => break,
            Step::Idle => thread::sleep(constants::queue::POLL_INTERVAL),
            Step::Play(mut announcement) => {
                info!(
                    id = %announcement.id,
                    kind = %announcement.kind,
                    files = announcement.audio_files.len(),
                    "dispatching announcement"
                );

                let sink_ref: Option<&mut dyn AudioSink> = match &mut sink {
                    Some(boxed) => Some(&mut **boxed),
                    None => None,
                };
                let playback_error = play_sequence(&announcement, sink_ref);

                let completed_at = Utc::now();
                announcement.duration_secs = announcement
                    .started_at
                    .map(|started| (completed_at - started).num_milliseconds() as f64 / 1000.0);
                announcement.completed_at = Some(completed_at);
                announcement.status = if playback_error.is_some() {
                    AnnouncementStatus::Failed
                } else {
                    AnnouncementStatus::Completed
                };
                announcement.error = playback_error;

                if announcement.status == AnnouncementStatus::Failed {
                    warn!(
                        id = %announcement.id,
                        error = announcement.error.as_deref().unwrap_or(""),
                        "announcement failed"
                    );
                } else {
                    info!(id = %announcement.id, "announcement completed");
                }

                let mut state = shared.state.lock();
                state.current = None;
                push_history(&mut state, shared.max_history, announcement);
            }
        }
    }
}

/// Play every file of the sequence in order.
///
/// Missing files are skipped with a warning and do not fail the
/// announcement; sink errors are recorded and the remaining files still
/// play. Returns the combined error text, if any file's playback failed.
fn play_sequence(
    announcement: &Announcement,
    sink: Option<&mut dyn AudioSink>,
) -> Option<String> {
    let sink = match sink {
        Some(sink) => sink,
        None => return Some("audio unavailable".to_string()),
    };

    let mut errors: Vec<String> = Vec::new();
    for path in &announcement.audio_files {
        if !path.exists() {
            warn!(
                id = %announcement.id,
                file = %path.display(),
                "audio file missing, skipping"
            );
            continue;
        }
        match sink.play(path) {
            Ok(()) => thread::sleep(constants::queue::INTER_FILE_GAP),
            Err(e) => {
                error!(
                    id = %announcement.id,
                    file = %path.display(),
                    error = %e,
                    "playback failed, continuing sequence"
                );
                errors.push(format!("{}: {e}", file_name(path)));
            }
        }
    }

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn push_history(state: &mut QueueState, max_history: usize, announcement: Announcement) {
    state.history.push_back(announcement);
    while state.history.len() > max_history {
        state.history.pop_front();
    }
}

// ---------- Tests -----------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::{AnnouncementType, Priority};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn make_announcement(id: &str, priority: Priority) -> Announcement {
        Announcement::new(
            id.to_string(),
            AnnouncementType::Promo,
            priority,
            HashMap::new(),
            Vec::new(),
            Utc::now(),
        )
    }

    fn entry(id: &str, priority: Priority, seq: u64) -> PendingEntry {
        PendingEntry {
            announcement: make_announcement(id, priority),
            seq,
        }
    }

    /// Poll the queue until `pred` holds or the deadline passes.
    fn wait_for(queue: &AnnouncementQueue, pred: impl Fn(&QueueStatus) -> bool) -> QueueStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = queue.status();
            if pred(&status) {
                return status;
            }
            assert!(Instant::now() < deadline, "condition not reached within 5 s");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    // ── Pending-set ordering ─────────────────────────────────────────────────

    #[test]
    fn test_pending_order_higher_priority_first() {
        let mut heap = BinaryHeap::new();
        heap.push(entry("low", Priority::Low, 0));
        heap.push(entry("emergency", Priority::Emergency, 1));
        heap.push(entry("normal", Priority::Normal, 2));

        assert_eq!(heap.pop().unwrap().announcement.id, "emergency");
        assert_eq!(heap.pop().unwrap().announcement.id, "normal");
        assert_eq!(heap.pop().unwrap().announcement.id, "low");
    }

    #[test]
    fn test_pending_order_earlier_schedule_first_within_priority() {
        let now = Utc::now();
        let mut early = make_announcement("early", Priority::Normal);
        early.scheduled_at = now;
        let mut late = make_announcement("late", Priority::Normal);
        late.scheduled_at = now + ChronoDuration::seconds(30);

        let mut heap = BinaryHeap::new();
        heap.push(PendingEntry {
            announcement: late,
            seq: 0,
        });
        heap.push(PendingEntry {
            announcement: early,
            seq: 1,
        });

        assert_eq!(heap.pop().unwrap().announcement.id, "early");
        assert_eq!(heap.pop().unwrap().announcement.id, "late");
    }

    #[test]
    fn test_pending_order_fifo_on_full_tie() {
        let scheduled = Utc::now();
        let mut heap = BinaryHeap::new();
        for (i, id) in ["first", "second", "third"].iter().enumerate() {
            let mut ann = make_announcement(id, Priority::Normal);
            ann.scheduled_at = scheduled;
            heap.push(PendingEntry {
                announcement: ann,
                seq: i as u64,
            });
        }

        assert_eq!(heap.pop().unwrap().announcement.id, "first");
        assert_eq!(heap.pop().unwrap().announcement.id, "second");
        assert_eq!(heap.pop().unwrap().announcement.id, "third");
    }

    #[test]
    fn test_lightning_outranks_emergency() {
        let mut heap = BinaryHeap::new();
        heap.push(entry("emergency", Priority::Emergency, 0));
        heap.push(entry("lightning", Priority::Lightning, 1));

        assert_eq!(heap.pop().unwrap().announcement.id, "lightning");
    }

    // ── Queue API ────────────────────────────────────────────────────────────

    #[test]
    fn test_enqueue_after_stop_fails() {
        let queue = AnnouncementQueue::start(None, 10).expect("start");
        queue.stop();

        let err = queue
            .enqueue(make_announcement("a", Priority::Normal))
            .unwrap_err();
        assert!(matches!(err, QueueError::Stopped));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let queue = AnnouncementQueue::start(None, 10).expect("start");
        queue.stop();
        queue.stop();
        assert!(!queue.is_running());
    }

    #[test]
    fn test_cancel_queued_item_moves_to_history_once() {
        let queue = AnnouncementQueue::start(None, 10).expect("start");

        // Schedule far in the future so the dispatcher cannot grab it.
        let mut ann = make_announcement("cancel_me", Priority::Normal);
        ann.scheduled_at = Utc::now() + ChronoDuration::seconds(60);
        queue.enqueue(ann).expect("enqueue");

        let cancelled = queue.cancel("cancel_me").expect("cancel");
        assert_eq!(cancelled.status, AnnouncementStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        let status = queue.status();
        assert_eq!(status.pending_count, 0);
        assert_eq!(status.history_count, 1);
        assert_eq!(queue.history(10)[0].id, "cancel_me");

        queue.stop();
    }

    #[test]
    fn test_cancel_unknown_id_is_not_found() {
        let queue = AnnouncementQueue::start(None, 10).expect("start");

        let err = queue.cancel("ann_0_999").unwrap_err();
        assert!(matches!(err, QueueError::NotFound { .. }));

        queue.stop();
    }

    #[test]
    fn test_cancel_terminal_item_is_rejected() {
        // No sink → dispatched items fail fast and land in history.
        let queue = AnnouncementQueue::start(None, 10).expect("start");
        queue
            .enqueue(make_announcement("done", Priority::Normal))
            .expect("enqueue");

        wait_for(&queue, |s| s.history_count == 1);

        let err = queue.cancel("done").unwrap_err();
        assert!(matches!(
            err,
            QueueError::CannotCancel {
                status: AnnouncementStatus::Failed
            }
        ));

        queue.stop();
    }

    #[test]
    fn test_dispatch_without_sink_marks_failed() {
        let queue = AnnouncementQueue::start(None, 10).expect("start");
        assert!(!queue.audio_available());

        queue
            .enqueue(make_announcement("no_audio", Priority::Normal))
            .expect("enqueue");

        let status = wait_for(&queue, |s| s.history_count == 1);
        assert!(status.currently_playing.is_none());

        let terminal = &queue.history(1)[0];
        assert_eq!(terminal.status, AnnouncementStatus::Failed);
        assert_eq!(terminal.error.as_deref(), Some("audio unavailable"));
        assert!(terminal.completed_at.is_some());

        queue.stop();
    }

    #[test]
    fn test_history_ring_is_bounded() {
        let queue = AnnouncementQueue::start(None, 3).expect("start");

        for i in 0..6 {
            queue
                .enqueue(make_announcement(&format!("a{i}"), Priority::Normal))
                .expect("enqueue");
        }

        wait_for(&queue, |s| s.pending_count == 0 && s.currently_playing.is_none());

        let status = queue.status();
        assert!(status.history_count <= 3);

        // Newest-first: the last-dispatched item leads.
        let history = queue.history(10);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, "a5");

        queue.stop();
    }

    #[test]
    fn test_future_scheduled_item_is_not_dispatched_early() {
        let queue = AnnouncementQueue::start(None, 10).expect("start");

        let mut ann = make_announcement("later", Priority::High);
        ann.scheduled_at = Utc::now() + ChronoDuration::seconds(60);
        queue.enqueue(ann).expect("enqueue");

        std::thread::sleep(Duration::from_millis(300));
        let status = queue.status();
        assert_eq!(status.pending_count, 1);
        assert!(status.currently_playing.is_none());
        assert_eq!(status.history_count, 0);

        queue.stop();
    }

    // ── play_sequence ────────────────────────────────────────────────────────

    struct FailingSink;

    impl AudioSink for FailingSink {
        fn play(&mut self, _path: &Path) -> Result<(), crate::audio::AudioError> {
            Err(crate::audio::AudioError::DecodingFailed("corrupt".into()))
        }
    }

    #[test]
    fn test_play_sequence_missing_files_alone_complete() {
        let mut sink = FailingSink;
        let mut ann = make_announcement("missing", Priority::Normal);
        ann.audio_files = vec!["/nonexistent/one.mp3".into(), "/nonexistent/two.mp3".into()];

        // Both files are absent, so the sink is never invoked and no error
        // is recorded — missing assets are soft.
        let result = play_sequence(&ann, Some(&mut sink));
        assert!(result.is_none());
    }

    #[test]
    fn test_play_sequence_sink_error_is_recorded_and_continues() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("first.mp3");
        let second = dir.path().join("second.mp3");
        std::fs::write(&first, b"x").unwrap();
        std::fs::write(&second, b"x").unwrap();

        let mut ann = make_announcement("broken", Priority::Normal);
        ann.audio_files = vec![first, second];

        let mut sink = FailingSink;
        let result = play_sequence(&ann, Some(&mut sink)).expect("errors expected");

        // Both files were attempted despite the first failing.
        assert!(result.contains("first.mp3"));
        assert!(result.contains("second.mp3"));
    }
}
