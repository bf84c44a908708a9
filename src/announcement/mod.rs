//! Announcement model — the queue entry and its lifecycle.
//!
//! An [`Announcement`] is one playback job: a typed request expanded into an
//! ordered list of audio files at submit time, carried through
//! `queued → playing → {completed, failed}` (or `queued → cancelled`) by the
//! queue engine. Priority and schedule are fixed at submit; all ordering is
//! derived from them.

pub mod planner;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playback priority, ordered low → lightning.
///
/// Lightning alerts outrank everything, including emergencies: a storm
/// warning must not wait behind an in-progress emergency backlog. The
/// numeric gap between `Emergency` (5) and `Lightning` (10) is part of the
/// external contract and is preserved in the discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
    Emergency = 5,
    Lightning = 10,
}

impl Priority {
    /// Numeric rank as carried on the wire by older clients.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
            Priority::Emergency => "emergency",
            Priority::Lightning => "lightning",
        };
        write!(f, "{name}")
    }
}

/// Kind of announcement; determines which sequence the planner builds and
/// the default priority when a caller omits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementType {
    Station,
    Safety,
    Promo,
    Emergency,
    Lightning,
}

impl AnnouncementType {
    pub fn default_priority(self) -> Priority {
        match self {
            AnnouncementType::Station => Priority::Normal,
            AnnouncementType::Safety => Priority::High,
            AnnouncementType::Promo => Priority::Low,
            AnnouncementType::Emergency => Priority::Emergency,
            AnnouncementType::Lightning => Priority::Lightning,
        }
    }
}

impl std::fmt::Display for AnnouncementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnnouncementType::Station => "station",
            AnnouncementType::Safety => "safety",
            AnnouncementType::Promo => "promo",
            AnnouncementType::Emergency => "emergency",
            AnnouncementType::Lightning => "lightning",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle status. `Completed`, `Cancelled`, and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStatus {
    Queued,
    Playing,
    Completed,
    Cancelled,
    Failed,
}

impl AnnouncementStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnnouncementStatus::Completed
                | AnnouncementStatus::Cancelled
                | AnnouncementStatus::Failed
        )
    }
}

impl std::fmt::Display for AnnouncementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnnouncementStatus::Queued => "queued",
            AnnouncementStatus::Playing => "playing",
            AnnouncementStatus::Completed => "completed",
            AnnouncementStatus::Cancelled => "cancelled",
            AnnouncementStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// One queued playback job.
///
/// `parameters` holds the request-specific fields (train number, language,
/// file, condition, …); `audio_files` is the sequence computed at submit
/// time and never re-planned, even if catalogs are reloaded while the item
/// is still pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnouncementType,
    pub priority: Priority,
    pub status: AnnouncementStatus,
    pub created_at: DateTime<Utc>,
    /// Earliest time the dispatcher may start this announcement.
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parameters: HashMap<String, String>,
    pub audio_files: Vec<PathBuf>,
    /// Wall-clock playback duration in seconds, set on terminal transition.
    pub duration_secs: Option<f64>,
    pub error: Option<String>,
}

impl Announcement {
    pub fn new(
        id: String,
        kind: AnnouncementType,
        priority: Priority,
        parameters: HashMap<String, String>,
        audio_files: Vec<PathBuf>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            priority,
            status: AnnouncementStatus::Queued,
            created_at: Utc::now(),
            scheduled_at,
            started_at: None,
            completed_at: None,
            parameters,
            audio_files,
            duration_secs: None,
            error: None,
        }
    }
}

/// Process-monotonic announcement id allocator.
///
/// Ids take the form `ann_<unix>_<seq>`; the sequence component alone makes
/// them unique within a process, the timestamp makes them readable in logs.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counter: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ann_{}_{}", Utc::now().timestamp(), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_low_to_lightning() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert!(Priority::Critical < Priority::Emergency);
        assert!(Priority::Emergency < Priority::Lightning);
    }

    #[test]
    fn test_priority_ranks_preserve_lightning_gap() {
        assert_eq!(Priority::Emergency.rank(), 5);
        assert_eq!(Priority::Lightning.rank(), 10);
    }

    #[test]
    fn test_default_priorities_per_type() {
        assert_eq!(
            AnnouncementType::Station.default_priority(),
            Priority::Normal
        );
        assert_eq!(AnnouncementType::Safety.default_priority(), Priority::High);
        assert_eq!(AnnouncementType::Promo.default_priority(), Priority::Low);
        assert_eq!(
            AnnouncementType::Emergency.default_priority(),
            Priority::Emergency
        );
        assert_eq!(
            AnnouncementType::Lightning.default_priority(),
            Priority::Lightning
        );
    }

    #[test]
    fn test_status_terminality() {
        assert!(!AnnouncementStatus::Queued.is_terminal());
        assert!(!AnnouncementStatus::Playing.is_terminal());
        assert!(AnnouncementStatus::Completed.is_terminal());
        assert!(AnnouncementStatus::Cancelled.is_terminal());
        assert!(AnnouncementStatus::Failed.is_terminal());
    }

    #[test]
    fn test_id_allocator_is_monotonic_and_unique() {
        let alloc = IdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();

        assert!(a.starts_with("ann_"));
        assert_ne!(a, b);
        assert!(a.ends_with("_1"));
        assert!(b.ends_with("_2"));
    }

    #[test]
    fn test_announcement_serializes_type_field() {
        let ann = Announcement::new(
            "ann_0_1".into(),
            AnnouncementType::Station,
            Priority::Normal,
            HashMap::new(),
            Vec::new(),
            Utc::now(),
        );

        let json = serde_json::to_value(&ann).expect("serialize");
        assert_eq!(json["type"], "station");
        assert_eq!(json["priority"], "normal");
        assert_eq!(json["status"], "queued");
    }
}
