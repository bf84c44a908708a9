//! Lightning monitor — polls a detector's XML feed and turns condition
//! transitions into queue submissions.
//!
//! One background worker per monitor. Each tick fetches the feed, decodes
//! it (UTF-8 or UTF-16, see [`encoding`]), extracts `<lightningalert>`, and
//! runs the value through a small state machine over the last observed
//! condition. Only genuine transitions announce; `Unknown` is treated as a
//! transient parse error and `AllClear` is announced only when it clears an
//! actual alert.

pub mod encoding;

pub use encoding::{decode_body, extract_alert};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogStore, LightningAnnouncement};
use crate::constants;
use crate::queue::AnnouncementManager;

/// Monitor connection settings; replaced wholesale by `update_config`.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub url: String,
    pub fetch_interval: Duration,
    pub timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            fetch_interval: constants::lightning::DEFAULT_FETCH_INTERVAL,
            timeout: constants::lightning::DEFAULT_TIMEOUT,
        }
    }
}

/// Serializable view of the monitor for the status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitorSnapshot {
    pub last_condition: String,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_condition_at: Option<DateTime<Utc>>,
    pub decode_errors: u64,
    pub running: bool,
}

/// What an observed condition means relative to the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    /// Parse hiccup (`Unknown`): no state update, no announcement.
    Transient,
    /// Same condition as before: nothing to do.
    NoChange,
    /// State updates silently (`AllClear` with no preceding alert).
    Update,
    /// State updates and an announcement fires.
    UpdateAndAnnounce,
}

/// The condition state machine. Comparisons are case-insensitive.
pub fn evaluate_condition(last: &str, observed: &str) -> ConditionOutcome {
    if observed.eq_ignore_ascii_case("Unknown") {
        return ConditionOutcome::Transient;
    }
    if observed.eq_ignore_ascii_case(last) {
        return ConditionOutcome::NoChange;
    }
    if observed.eq_ignore_ascii_case("AllClear") {
        if last.eq_ignore_ascii_case("RedAlert") || last.eq_ignore_ascii_case("Warning") {
            return ConditionOutcome::UpdateAndAnnounce;
        }
        return ConditionOutcome::Update;
    }
    ConditionOutcome::UpdateAndAnnounce
}

/// Lowercased alphanumeric form of a condition ("RedAlert" → "redalert").
fn condition_token(condition: &str) -> String {
    condition
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Pick the catalog entry for a condition.
///
/// First pass: enabled entries whose id contains the condition token.
/// Fallback: enabled entries tagged with the `generic_<condition>` category.
pub fn resolve_announcement<'a>(
    entries: &'a [LightningAnnouncement],
    condition: &str,
) -> Option<&'a LightningAnnouncement> {
    let token = condition_token(condition);
    if token.is_empty() {
        return None;
    }

    entries
        .iter()
        .find(|e| e.enabled && e.id.to_ascii_lowercase().contains(&token))
        .or_else(|| {
            let generic = format!("generic_{token}");
            entries
                .iter()
                .find(|e| e.enabled && e.category.eq_ignore_ascii_case(&generic))
        })
}

struct MonitorState {
    last_condition: String,
    last_fetch_at: Option<DateTime<Utc>>,
    last_condition_at: Option<DateTime<Utc>>,
    decode_errors: u64,
}

struct MonitorShared {
    manager: Arc<AnnouncementManager>,
    catalogs: Arc<CatalogStore>,
    xml_dir: PathBuf,
    config: Mutex<MonitorConfig>,
    state: Mutex<MonitorState>,
}

/// Background poller for one lightning detector feed.
pub struct LightningMonitor {
    shared: Arc<MonitorShared>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl LightningMonitor {
    pub fn new(
        manager: Arc<AnnouncementManager>,
        catalogs: Arc<CatalogStore>,
        xml_dir: PathBuf,
        config: MonitorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(MonitorShared {
                manager,
                catalogs,
                xml_dir,
                config: Mutex::new(config),
                state: Mutex::new(MonitorState {
                    last_condition: constants::lightning::INITIAL_CONDITION.to_string(),
                    last_fetch_at: None,
                    last_condition_at: None,
                    decode_errors: 0,
                }),
            }),
            stop_tx: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.shared.state.lock();
        MonitorSnapshot {
            last_condition: state.last_condition.clone(),
            last_fetch_at: state.last_fetch_at,
            last_condition_at: state.last_condition_at,
            decode_errors: state.decode_errors,
            running: self.stop_tx.lock().is_some(),
        }
    }

    /// Spawn the ticker task. No-op if already running or the URL is unset
    /// or invalid.
    pub fn start(&self) {
        let mut stop_slot = self.stop_tx.lock();
        if stop_slot.is_some() {
            return;
        }

        let config = self.shared.config.lock().clone();
        if config.url.is_empty() {
            warn!("lightning monitor not started: no feed URL configured");
            return;
        }
        if let Err(e) = url::Url::parse(&config.url) {
            error!(url = %config.url, error = %e, "lightning monitor not started: invalid URL");
            return;
        }

        let client = match Client::builder()
            .user_agent(constants::network::USER_AGENT)
            .timeout(config.timeout)
            .connect_timeout(constants::network::CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(
                constants::network::MAX_REDIRECTS,
            ))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "failed to build lightning HTTP client");
                return;
            }
        };

        let (tx, mut rx) = watch::channel(false);
        *stop_slot = Some(tx);

        let shared = Arc::clone(&self.shared);
        info!(url = %config.url, interval_s = config.fetch_interval.as_secs(), "lightning monitor started");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.fetch_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        fetch_and_check(&shared, &client, &config.url).await;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("lightning monitor stopped");
        });
    }

    /// Signal the ticker task to exit. Returns whether it was running.
    pub fn stop(&self) -> bool {
        match self.stop_tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }

    /// Replace the connection settings, restarting the worker if it was
    /// running so the new URL/interval/timeout take effect.
    pub fn update_config(&self, config: MonitorConfig) {
        let was_running = self.stop();
        *self.shared.config.lock() = config;
        if was_running {
            self.start();
        }
    }
}

// ---------- Fetch cycle -----------------------------------------------------

async fn fetch_and_check(shared: &MonitorShared, client: &Client, url: &str) {
    shared.state.lock().last_fetch_at = Some(Utc::now());

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            info!(error = %e, "lightning fetch failed, will retry next tick");
            return;
        }
    };
    if !response.status().is_success() {
        info!(status = %response.status(), "lightning feed returned non-success status");
        return;
    }
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            info!(error = %e, "lightning feed body read failed");
            return;
        }
    };

    persist_feed(shared, url, &body).await;

    let text = match decode_body(&body) {
        Some(text) => text,
        None => {
            shared.state.lock().decode_errors += 1;
            warn!("lightning feed body is not decodable text");
            return;
        }
    };
    let condition = match extract_alert(&text) {
        Some(condition) => condition,
        None => {
            shared.state.lock().decode_errors += 1;
            warn!("lightning feed has no <lightningalert> element");
            return;
        }
    };

    observe_condition(shared, &condition);
}

/// Run one observed condition through the state machine, announcing on a
/// genuine transition.
fn observe_condition(shared: &MonitorShared, condition: &str) {
    let outcome = {
        let mut state = shared.state.lock();
        let outcome = evaluate_condition(&state.last_condition, condition);
        match outcome {
            ConditionOutcome::Transient => {
                debug!(%condition, "transient condition ignored");
            }
            ConditionOutcome::NoChange => {}
            ConditionOutcome::Update | ConditionOutcome::UpdateAndAnnounce => {
                info!(
                    from = %state.last_condition,
                    to = %condition,
                    announce = outcome == ConditionOutcome::UpdateAndAnnounce,
                    "lightning condition changed"
                );
                state.last_condition = condition.to_string();
                state.last_condition_at = Some(Utc::now());
            }
        }
        outcome
    };

    if outcome == ConditionOutcome::UpdateAndAnnounce {
        announce(shared, condition);
    }
}

fn announce(shared: &MonitorShared, condition: &str) {
    let catalogs = shared.catalogs.snapshot();
    match resolve_announcement(&catalogs.lightning, condition) {
        Some(entry) => match shared.manager.submit_lightning(entry, condition) {
            Ok(announcement) => {
                info!(id = %announcement.id, %condition, "lightning announcement submitted");
            }
            Err(e) => warn!(%condition, error = %e, "lightning submission rejected"),
        },
        None => warn!(%condition, "no lightning announcement matches condition"),
    }
}

/// Best-effort copy of the raw feed body next to the working directory;
/// failures are logged and never abort the cycle.
async fn persist_feed(shared: &MonitorShared, url: &str, body: &[u8]) {
    if let Err(e) = tokio::fs::create_dir_all(&shared.xml_dir).await {
        debug!(error = %e, "could not create xml directory");
        return;
    }
    let path = shared.xml_dir.join(derived_file_name(url));
    if let Err(e) = tokio::fs::write(&path, body).await {
        debug!(path = %path.display(), error = %e, "could not persist feed body");
    }
}

/// Filesystem-safe name derived from the feed URL.
fn derived_file_name(url: &str) -> String {
    let trimmed = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let sanitized = Regex::new(r"[^A-Za-z0-9._-]+")
        .expect("static regex")
        .replace_all(trimmed, "_")
        .trim_matches('_')
        .to_string();

    if sanitized.is_empty() {
        "lightning.xml".to_string()
    } else if sanitized.ends_with(".xml") {
        sanitized
    } else {
        format!("{sanitized}.xml")
    }
}

// ---------- Tests -----------------------------------------------------------
