// CatalogStore — loads the JSON catalogs and publishes immutable snapshots.
//
// Read-copy-update: readers grab an Arc<Catalogs> and keep it for as long
// as they need; reload() swaps the pointer. Writes go through an atomic
// temp-file + rename so a crashed save never leaves a torn catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::warn;

use super::{parse_entries, AdminConfig, CatalogError, Catalogs};
use crate::constants;
use crate::scheduler::jobs::CronData;

pub struct CatalogStore {
    json_dir: PathBuf,
    current: RwLock<Arc<Catalogs>>,
}

impl CatalogStore {
    /// Create a store rooted at `json_dir` with empty catalogs; call
    /// [`CatalogStore::reload`] to populate it.
    pub fn new(json_dir: PathBuf) -> Self {
        Self {
            json_dir,
            current: RwLock::new(Arc::new(Catalogs::default())),
        }
    }

    pub fn json_dir(&self) -> &Path {
        &self.json_dir
    }

    /// Current immutable snapshot. Holders are unaffected by later reloads.
    pub fn snapshot(&self) -> Arc<Catalogs> {
        Arc::clone(&self.current.read())
    }

    /// Re-read every catalog file and swap the snapshot.
    ///
    /// Missing files are tolerated (empty catalog, logged); malformed files
    /// abort the reload so the previous snapshot stays in effect.
    pub async fn reload(&self) -> Result<(), CatalogError> {
        let catalogs = Catalogs {
            trains: self.load_file("trains_selected", "trains").await?,
            trains_available: self.load_file("trains_available", "trains").await?,
            directions: self.load_file("directions", "directions").await?,
            destinations: self
                .load_file("destinations_selected", "destinations")
                .await?,
            destinations_available: self
                .load_file("destinations_available", "destinations")
                .await?,
            tracks: self.load_file("tracks", "tracks").await?,
            safety_languages: self.load_file("safety", "safety").await?,
            promos: self.load_file("promo", "promo").await?,
            emergencies: self.load_file("emergencies", "emergencies").await?,
            lightning: self.load_file("lightning", "lightning").await?,
        };

        *self.current.write() = Arc::new(catalogs);
        Ok(())
    }

    async fn load_file<T: DeserializeOwned>(
        &self,
        stem: &str,
        key: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let path = self.json_dir.join(format!("{stem}.json"));
        if !path.exists() {
            warn!(path = %path.display(), "catalog file missing, using empty catalog");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| CatalogError::FileOperation {
                operation: "read",
                path: path.clone(),
                source: e,
            })?;
        parse_entries(&content, key, &path)
    }

    // ---------- cron.json ---------------------------------------------------

    /// Load `cron.json`, falling back to an empty schedule when absent.
    pub async fn load_cron(&self) -> Result<CronData, CatalogError> {
        let path = self.json_dir.join("cron.json");
        if !path.exists() {
            warn!(path = %path.display(), "cron.json missing, starting with empty schedule");
            return Ok(CronData::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| CatalogError::FileOperation {
                operation: "read",
                path: path.clone(),
                source: e,
            })?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Persist `cron.json`; the caller triggers a scheduler reload afterwards.
    pub async fn save_cron(&self, data: &CronData) -> Result<(), CatalogError> {
        let path = self.json_dir.join("cron.json");
        let json = serde_json::to_string_pretty(data).map_err(|e| CatalogError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        atomic_write(&path, &json, catalog_mode()).await
    }

    // ---------- admin_config.json -------------------------------------------

    /// Load the admin credentials file, defaulting when absent.
    pub async fn load_admin_config(&self) -> Result<AdminConfig, CatalogError> {
        let path = self.json_dir.join("admin_config.json");
        if !path.exists() {
            return Ok(AdminConfig::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| CatalogError::FileOperation {
                operation: "read",
                path: path.clone(),
                source: e,
            })?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Persist the admin credentials file with owner-only permissions.
    pub async fn save_admin_config(&self, config: &AdminConfig) -> Result<(), CatalogError> {
        let path = self.json_dir.join("admin_config.json");
        let json = serde_json::to_string_pretty(config).map_err(|e| CatalogError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        atomic_write(&path, &json, admin_mode()).await
    }
}

// ---------- Atomic write ----------------------------------------------------

#[cfg(unix)]
fn catalog_mode() -> Option<u32> {
    Some(constants::catalog::CATALOG_FILE_PERMISSIONS)
}

#[cfg(not(unix))]
fn catalog_mode() -> Option<u32> {
    None
}

#[cfg(unix)]
fn admin_mode() -> Option<u32> {
    Some(constants::catalog::ADMIN_FILE_PERMISSIONS)
}

#[cfg(not(unix))]
fn admin_mode() -> Option<u32> {
    None
}

/// Write `content` to a temp file, fix its permissions, then rename into
/// place so readers never observe a partial file.
async fn atomic_write(path: &Path, content: &str, mode: Option<u32>) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CatalogError::FileOperation {
                operation: "create_dir_all",
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let temp_path = path.with_extension(constants::catalog::TEMP_FILE_SUFFIX);
    fs::write(&temp_path, content)
        .await
        .map_err(|e| CatalogError::FileOperation {
            operation: "write_temp",
            path: temp_path.clone(),
            source: e,
        })?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| CatalogError::FileOperation {
                operation: "set_permissions",
                path: temp_path.clone(),
                source: e,
            })?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| CatalogError::FileOperation {
            operation: "rename",
            path: path.to_path_buf(),
            source: e,
        })
}
