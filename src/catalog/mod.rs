//! Catalogs — JSON-backed lookup tables of announcement assets.
//!
//! Catalog entities are immutable after load; an admin save re-reads the
//! files and swaps the in-memory snapshot (read-copy-update), so in-flight
//! announcements keep the sequences they were planned against.
//!
//! File format tolerance: each catalog file may be either a bare array
//! (`[{...}]`) or a single-key object (`{"trains": [{...}]}`); unknown keys
//! are ignored, missing files fall back to an empty catalog.

pub mod store;

pub use store::CatalogStore;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors from catalog loading and saving.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{operation} failed for {path}: {source}")]
    FileOperation {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// A plain `{id, name}` catalog entry (trains, directions, destinations,
/// tracks, safety languages, promos). `id` is the filename stem of the
/// corresponding audio asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

/// An emergency announcement definition; `id` resolves to
/// `emergency/<id>.mp3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emergency {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// A lightning alert announcement, selected by fuzzy match against the
/// feed's condition string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightningAnnouncement {
    pub id: String,
    pub name: String,
    pub audio_file: String,
    #[serde(default)]
    pub tts_text: String,
    #[serde(default = "default_lightning_priority")]
    pub priority: u8,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub category: String,
}

fn default_lightning_priority() -> u8 {
    10
}

fn default_enabled() -> bool {
    true
}

/// Admin credentials; persisted with 0600 permissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub api_key: String,
}

/// One immutable snapshot of every catalog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalogs {
    pub trains: Vec<CatalogEntry>,
    pub trains_available: Vec<CatalogEntry>,
    pub directions: Vec<CatalogEntry>,
    pub destinations: Vec<CatalogEntry>,
    pub destinations_available: Vec<CatalogEntry>,
    pub tracks: Vec<CatalogEntry>,
    pub safety_languages: Vec<CatalogEntry>,
    pub promos: Vec<CatalogEntry>,
    pub emergencies: Vec<Emergency>,
    pub lightning: Vec<LightningAnnouncement>,
}

impl Catalogs {
    pub fn has_train(&self, id: &str) -> bool {
        contains(&self.trains, id)
    }

    pub fn has_direction(&self, id: &str) -> bool {
        contains(&self.directions, id)
    }

    pub fn has_destination(&self, id: &str) -> bool {
        contains(&self.destinations, id)
    }

    pub fn has_track(&self, id: &str) -> bool {
        contains(&self.tracks, id)
    }

    pub fn has_safety_language(&self, id: &str) -> bool {
        contains(&self.safety_languages, id)
    }

    pub fn has_promo(&self, id: &str) -> bool {
        contains(&self.promos, id)
    }

    pub fn has_emergency(&self, id: &str) -> bool {
        self.emergencies.iter().any(|e| e.id == id)
    }
}

fn contains(entries: &[CatalogEntry], id: &str) -> bool {
    entries.iter().any(|e| e.id == id)
}

/// Parse one catalog file body, accepting both supported shapes.
///
/// For the object form, the array under `key` wins; if `key` is absent the
/// first array-valued entry is used (older files used ad-hoc key names).
pub(crate) fn parse_entries<T: DeserializeOwned>(
    content: &str,
    key: &str,
    path: &std::path::Path,
) -> Result<Vec<T>, CatalogError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| CatalogError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove(key) {
            Some(serde_json::Value::Array(items)) => items,
            _ => map
                .into_iter()
                .find_map(|(_, v)| match v {
                    serde_json::Value::Array(items) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| CatalogError::Parse {
                    path: path.to_path_buf(),
                    reason: format!("object form has no array under {key:?}"),
                })?,
        },
        _ => {
            return Err(CatalogError::Parse {
                path: path.to_path_buf(),
                reason: "expected an array or a keyed object".to_string(),
            })
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| CatalogError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_entries_bare_array_form() {
        let content = r#"[{"id": "1", "name": "Train 1"}, {"id": "2", "name": "Train 2"}]"#;

        let entries: Vec<CatalogEntry> =
            parse_entries(content, "trains", Path::new("trains.json")).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "1");
    }

    #[test]
    fn test_parse_entries_keyed_object_form() {
        let content = r#"{"trains": [{"id": "7", "name": "Train 7"}]}"#;

        let entries: Vec<CatalogEntry> =
            parse_entries(content, "trains", Path::new("trains.json")).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "7");
    }

    #[test]
    fn test_parse_entries_falls_back_to_first_array_key() {
        let content = r#"{"comment": "legacy", "items": [{"id": "x", "name": "X"}]}"#;

        let entries: Vec<CatalogEntry> =
            parse_entries(content, "trains", Path::new("trains.json")).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "x");
    }

    #[test]
    fn test_parse_entries_unknown_entry_keys_are_ignored() {
        let content = r#"[{"id": "1", "name": "Train 1", "color": "blue"}]"#;

        let entries: Vec<CatalogEntry> =
            parse_entries(content, "trains", Path::new("trains.json")).expect("parse");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_parse_entries_rejects_scalar_document() {
        let err = parse_entries::<CatalogEntry>("42", "trains", Path::new("trains.json"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn test_lightning_announcement_defaults() {
        let content = r#"[{"id": "redalert_en", "name": "Red Alert", "audio_file": "lightning/redalert.mp3"}]"#;

        let entries: Vec<LightningAnnouncement> =
            parse_entries(content, "lightning", Path::new("lightning.json")).expect("parse");
        assert_eq!(entries[0].priority, 10);
        assert!(entries[0].enabled);
        assert!(entries[0].tts_text.is_empty());
    }

    #[test]
    fn test_catalogs_lookup_helpers() {
        let catalogs = Catalogs {
            trains: vec![CatalogEntry {
                id: "1".into(),
                name: "Train 1".into(),
            }],
            emergencies: vec![Emergency {
                id: "evacuation".into(),
                name: "Evacuation".into(),
                description: String::new(),
                category: String::new(),
            }],
            ..Default::default()
        };

        assert!(catalogs.has_train("1"));
        assert!(!catalogs.has_train("2"));
        assert!(catalogs.has_emergency("evacuation"));
        assert!(!catalogs.has_safety_language("english"));
    }
}
