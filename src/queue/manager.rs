// AnnouncementManager — the submission facade.
//
// Every submitter (HTTP handlers, cron scheduler, lightning monitor) routes
// through here: validate against the catalogs, allocate an id, plan the
// audio sequence, enqueue. The manager holds no playback state of its own;
// the queue engine owns dispatch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::announcement::planner::{plan, PlanError};
use crate::announcement::{Announcement, AnnouncementType, IdAllocator, Priority};
use crate::audio::Volume;
use crate::catalog::{CatalogStore, LightningAnnouncement};
use crate::constants;
use crate::queue::engine::{AnnouncementQueue, QueueError, QueueStatus};

/// Errors returned to submitters.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("unknown {field}: {value}")]
    UnknownId { field: &'static str, value: String },
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct AnnouncementManager {
    queue: Arc<AnnouncementQueue>,
    catalogs: Arc<CatalogStore>,
    mp3_dir: PathBuf,
    volume: Volume,
    ids: IdAllocator,
}

impl AnnouncementManager {
    pub fn new(
        queue: Arc<AnnouncementQueue>,
        catalogs: Arc<CatalogStore>,
        mp3_dir: PathBuf,
        volume: Volume,
    ) -> Self {
        Self {
            queue,
            catalogs,
            mp3_dir,
            volume,
            ids: IdAllocator::new(),
        }
    }

    // ---------- Typed submissions -------------------------------------------

    /// Submit a station announcement; all four ids are validated against the
    /// selected catalogs.
    pub fn submit_station(
        &self,
        train_number: &str,
        direction: &str,
        destination: &str,
        track_number: &str,
        priority: Option<Priority>,
        delay: Option<Duration>,
    ) -> Result<Announcement, SubmitError> {
        let catalogs = self.catalogs.snapshot();
        if !catalogs.has_train(train_number) {
            return Err(unknown("train_number", train_number));
        }
        if !catalogs.has_direction(direction) {
            return Err(unknown("direction", direction));
        }
        if !catalogs.has_destination(destination) {
            return Err(unknown("destination", destination));
        }
        if !catalogs.has_track(track_number) {
            return Err(unknown("track_number", track_number));
        }

        let parameters = params(&[
            ("train_number", train_number),
            ("direction", direction),
            ("destination", destination),
            ("track_number", track_number),
        ]);
        self.submit_inner(
            AnnouncementType::Station,
            priority,
            parameters,
            schedule(delay),
        )
    }

    /// Submit a single-language safety announcement.
    pub fn submit_safety(
        &self,
        language: &str,
        priority: Option<Priority>,
        delay: Option<Duration>,
    ) -> Result<Announcement, SubmitError> {
        if !self.catalogs.snapshot().has_safety_language(language) {
            return Err(unknown("language", language));
        }
        self.submit_inner(
            AnnouncementType::Safety,
            priority,
            params(&[("language", language)]),
            schedule(delay),
        )
    }

    /// Submit one safety announcement per language, spaced `delay` apart.
    ///
    /// Each submission is a first-class queue entry with its own id; spacing
    /// is delegated to `scheduled_at`, so a higher-priority arrival may
    /// preempt a slot while the remaining languages still fire on time.
    pub fn submit_safety_sequence(
        &self,
        languages: &[String],
        delay: Duration,
    ) -> Result<Vec<Announcement>, SubmitError> {
        let catalogs = self.catalogs.snapshot();
        for language in languages {
            if !catalogs.has_safety_language(language) {
                return Err(unknown("language", language));
            }
        }

        let base = Utc::now();
        let mut submitted = Vec::with_capacity(languages.len());
        for (i, language) in languages.iter().enumerate() {
            let scheduled_at = base
                + chrono::Duration::from_std(delay * i as u32)
                    .unwrap_or_else(|_| chrono::Duration::zero());
            submitted.push(self.submit_inner(
                AnnouncementType::Safety,
                Some(Priority::High),
                params(&[("language", language)]),
                scheduled_at,
            )?);
        }
        Ok(submitted)
    }

    /// Submit a promo announcement.
    pub fn submit_promo(
        &self,
        file: &str,
        priority: Option<Priority>,
        delay: Option<Duration>,
    ) -> Result<Announcement, SubmitError> {
        if !self.catalogs.snapshot().has_promo(file) {
            return Err(unknown("file", file));
        }
        self.submit_inner(
            AnnouncementType::Promo,
            priority,
            params(&[("file", file)]),
            schedule(delay),
        )
    }

    /// Submit an emergency announcement: always emergency priority,
    /// scheduled immediately.
    pub fn submit_emergency(&self, file: &str) -> Result<Announcement, SubmitError> {
        if !self.catalogs.snapshot().has_emergency(file) {
            return Err(unknown("file", file));
        }
        self.submit_inner(
            AnnouncementType::Emergency,
            None,
            params(&[("file", file)]),
            Utc::now(),
        )
    }

    /// Submit a lightning alert for a resolved catalog entry.
    pub fn submit_lightning(
        &self,
        entry: &LightningAnnouncement,
        condition: &str,
    ) -> Result<Announcement, SubmitError> {
        let parameters = params(&[
            ("condition", condition),
            ("audio_file", &entry.audio_file),
            ("tts_text", &entry.tts_text),
            ("announcement_id", &entry.id),
        ]);
        self.submit_inner(AnnouncementType::Lightning, None, parameters, Utc::now())
    }

    fn submit_inner(
        &self,
        kind: AnnouncementType,
        priority: Option<Priority>,
        parameters: HashMap<String, String>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Announcement, SubmitError> {
        let priority = priority.unwrap_or_else(|| kind.default_priority());
        let audio_files = plan(&self.mp3_dir, kind, &parameters)?;
        let announcement = Announcement::new(
            self.ids.allocate(),
            kind,
            priority,
            parameters,
            audio_files,
            scheduled_at,
        );

        self.queue.enqueue(announcement.clone())?;
        info!(
            id = %announcement.id,
            kind = %kind,
            priority = %priority,
            scheduled_at = %scheduled_at,
            "announcement submitted"
        );
        Ok(announcement)
    }

    // ---------- Queue pass-through ------------------------------------------

    pub fn cancel(&self, id: &str) -> Result<Announcement, QueueError> {
        self.queue.cancel(id)
    }

    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    pub fn history(&self, limit: Option<usize>) -> Vec<Announcement> {
        self.queue
            .history(limit.unwrap_or(constants::queue::DEFAULT_HISTORY_LIMIT))
    }

    // ---------- Volume -------------------------------------------------------

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn volume_percent(&self) -> u8 {
        self.volume.percent()
    }

    /// Accepts a 0–1 fraction or a 0–100 percentage; returns the applied value.
    pub fn set_volume(&self, value: f32) -> f32 {
        self.volume.set_any(value)
    }
}

fn unknown(field: &'static str, value: &str) -> SubmitError {
    SubmitError::UnknownId {
        field,
        value: value.to_string(),
    }
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn schedule(delay: Option<Duration>) -> DateTime<Utc> {
    let now = Utc::now();
    match delay.and_then(|d| chrono::Duration::from_std(d).ok()) {
        Some(delay) => now + delay,
        None => now,
    }
}

// ---------- Tests -----------------------------------------------------------
