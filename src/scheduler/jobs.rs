// Cron job definitions — the serde shapes of cron.json.
//
// Cron expressions are the standard 5-field form:
// "minute hour day-of-month month day-of-week".

use serde::{Deserialize, Serialize};

/// The full contents of `cron.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronData {
    #[serde(default)]
    pub station_announcements: Vec<StationCronJob>,
    #[serde(default)]
    pub promo_announcements: Vec<PromoCronJob>,
    #[serde(default)]
    pub safety_announcements: Vec<SafetyCronJob>,
}

impl CronData {
    /// Count of jobs that would register (enabled, regardless of validity).
    pub fn enabled_count(&self) -> usize {
        self.station_announcements.iter().filter(|j| j.enabled).count()
            + self.promo_announcements.iter().filter(|j| j.enabled).count()
            + self.safety_announcements.iter().filter(|j| j.enabled).count()
    }
}

/// A scheduled station announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationCronJob {
    pub enabled: bool,
    pub cron: String,
    pub train_number: String,
    pub direction: String,
    pub destination: String,
    pub track_number: String,
}

/// A scheduled promo announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCronJob {
    pub enabled: bool,
    pub cron: String,
    pub file: String,
}

/// A scheduled safety announcement.
///
/// A non-empty `languages` list supersedes the single `language` field and
/// routes through the multi-language sequencer; `delay` is the spacing in
/// seconds between languages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCronJob {
    pub enabled: bool,
    pub cron: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub delay: Option<u64>,
}

impl SafetyCronJob {
    /// The effective language list: `languages` wins when non-empty.
    pub fn effective_languages(&self) -> Vec<String> {
        if !self.languages.is_empty() {
            self.languages.clone()
        } else {
            self.language.iter().cloned().collect()
        }
    }

    pub fn effective_delay_secs(&self) -> u64 {
        self.delay
            .unwrap_or(crate::constants::scheduler::DEFAULT_SAFETY_DELAY_SECS)
    }
}
