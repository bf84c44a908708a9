//! Announcement queue — priority-ordered playback with a single dispatcher.
//!
//! [`engine::AnnouncementQueue`] owns the pending set, the history ring, and
//! the dispatcher worker; [`manager::AnnouncementManager`] is the submission
//! facade the HTTP layer, the cron scheduler, and the lightning monitor all
//! route through.

pub mod engine;
pub mod manager;

pub use engine::{AnnouncementQueue, QueueError, QueueStatus};
pub use manager::{AnnouncementManager, SubmitError};
