//! Cron scheduler — fires announcement submissions on 5-field cron schedules.
//!
//! The worker is a tokio task ticking once a second; a job fires on the
//! first tick at or after its cron match. Callbacks only enqueue (submission
//! is lock-and-push), so a tick never blocks on playback.
//!
//! `reload` replaces the whole job table: invalid cron expressions are
//! logged and skipped without disturbing the other entries.

pub mod jobs;

pub use jobs::{CronData, PromoCronJob, SafetyCronJob, StationCronJob};

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::constants;
use crate::queue::AnnouncementManager;

/// Errors from cron expression parsing.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("expected 5 cron fields, got {0}")]
    FieldCount(usize),
    #[error("invalid cron expression: {0}")]
    Invalid(String),
}

/// What a due job submits. Parameters are copied out of the job definition
/// at reload time, so editing cron.json never mutates registered entries.
#[derive(Debug, Clone, PartialEq)]
pub enum JobAction {
    Station {
        train_number: String,
        direction: String,
        destination: String,
        track_number: String,
    },
    Promo {
        file: String,
    },
    Safety {
        languages: Vec<String>,
        delay_secs: u64,
    },
}

struct ScheduledJob {
    schedule: Schedule,
    action: JobAction,
    next_run: Option<DateTime<Utc>>,
}

/// Parse a standard 5-field cron expression.
///
/// The `cron` crate expects a leading seconds field, so a `0` seconds column
/// is prepended after validating the field count — the external cron.json
/// contract stays 5-field.
pub fn parse_cron(expr: &str) -> Result<Schedule, ScheduleError> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(ScheduleError::FieldCount(fields));
    }
    Schedule::from_str(&format!("0 {expr}")).map_err(|e| ScheduleError::Invalid(e.to_string()))
}

/// Cron-driven submitter.
pub struct CronScheduler {
    manager: Arc<AnnouncementManager>,
    jobs: Arc<Mutex<Vec<ScheduledJob>>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl CronScheduler {
    pub fn new(manager: Arc<AnnouncementManager>) -> Self {
        Self {
            manager,
            jobs: Arc::new(Mutex::new(Vec::new())),
            stop_tx: Mutex::new(None),
        }
    }

    /// Replace all registered jobs with the enabled entries of `data`.
    ///
    /// Returns the number of jobs that registered. Entries with invalid cron
    /// expressions (or safety entries with no language at all) are skipped
    /// with a logged warning; the rest still register.
    pub fn reload(&self, data: &CronData) -> usize {
        let now = Utc::now();
        let mut registered = Vec::new();

        for job in data.station_announcements.iter().filter(|j| j.enabled) {
            match parse_cron(&job.cron) {
                Ok(schedule) => registered.push(make_job(
                    schedule,
                    JobAction::Station {
                        train_number: job.train_number.clone(),
                        direction: job.direction.clone(),
                        destination: job.destination.clone(),
                        track_number: job.track_number.clone(),
                    },
                    now,
                )),
                Err(e) => warn!(cron = %job.cron, error = %e, "skipping station cron entry"),
            }
        }

        for job in data.promo_announcements.iter().filter(|j| j.enabled) {
            match parse_cron(&job.cron) {
                Ok(schedule) => registered.push(make_job(
                    schedule,
                    JobAction::Promo {
                        file: job.file.clone(),
                    },
                    now,
                )),
                Err(e) => warn!(cron = %job.cron, error = %e, "skipping promo cron entry"),
            }
        }

        for job in data.safety_announcements.iter().filter(|j| j.enabled) {
            let languages = job.effective_languages();
            if languages.is_empty() {
                warn!(cron = %job.cron, "skipping safety cron entry with no language");
                continue;
            }
            match parse_cron(&job.cron) {
                Ok(schedule) => registered.push(make_job(
                    schedule,
                    JobAction::Safety {
                        languages,
                        delay_secs: job.effective_delay_secs(),
                    },
                    now,
                )),
                Err(e) => warn!(cron = %job.cron, error = %e, "skipping safety cron entry"),
            }
        }

        let count = registered.len();
        *self.jobs.lock() = registered;
        info!(active_jobs = count, "cron schedule reloaded");
        count
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Spawn the ticker task. No-op if already running.
    pub fn start(&self) {
        let mut stop_slot = self.stop_tx.lock();
        if stop_slot.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        *stop_slot = Some(tx);

        let jobs = Arc::clone(&self.jobs);
        let manager = Arc::clone(&self.manager);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(constants::scheduler::TICK_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let due = due_actions(&mut jobs.lock(), Utc::now());
                        for action in due {
                            dispatch(&manager, action);
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("cron scheduler stopped");
        });
        info!("cron scheduler started");
    }

    /// Signal the ticker task to exit. No-op if not running.
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(true);
        }
    }
}

fn make_job(schedule: Schedule, action: JobAction, now: DateTime<Utc>) -> ScheduledJob {
    let next_run = schedule.after(&now).next();
    ScheduledJob {
        schedule,
        action,
        next_run,
    }
}

/// Collect the actions of every job whose fire time has arrived, advancing
/// each job's `next_run` past `now`.
fn due_actions(jobs: &mut Vec<ScheduledJob>, now: DateTime<Utc>) -> Vec<JobAction> {
    let mut due = Vec::new();
    for job in jobs.iter_mut() {
        if let Some(next) = job.next_run {
            if next <= now {
                due.push(job.action.clone());
                job.next_run = job.schedule.after(&now).next();
            }
        }
    }
    due
}

fn dispatch(manager: &AnnouncementManager, action: JobAction) {
    let result = match action {
        JobAction::Station {
            train_number,
            direction,
            destination,
            track_number,
        } => manager
            .submit_station(&train_number, &direction, &destination, &track_number, None, None)
            .map(|_| ()),
        JobAction::Promo { file } => manager.submit_promo(&file, None, None).map(|_| ()),
        JobAction::Safety {
            languages,
            delay_secs,
        } => manager
            .submit_safety_sequence(&languages, Duration::from_secs(delay_secs))
            .map(|_| ()),
    };

    if let Err(e) = result {
        warn!(error = %e, "scheduled announcement rejected");
    }
}
