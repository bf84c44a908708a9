use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lightning::MonitorConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub audio: AudioConfig,
    pub queue: QueueConfig,
    pub lightning: LightningConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load_or_default(custom_path: Option<&String>) -> Result<Self> {
        let config_path = match custom_path {
            Some(path) => PathBuf::from(path),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = Self::default();
            default_config.save(&config_path)?;
            Ok(default_config)
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Get the default configuration file path
    fn default_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "tarr-annunciator")
            .ok_or_else(|| anyhow::anyhow!("Unable to determine config directory"))?;

        Ok(project_dirs.config_dir().join("config.json"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            audio: AudioConfig::default(),
            queue: QueueConfig::default(),
            lightning: LightningConfig::default(),
        }
    }
}

/// Working-directory layout: where the audio assets, JSON catalogs, and
/// persisted feed bodies live. `~` is expanded at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub mp3_dir: String,
    pub json_dir: String,
    pub xml_dir: String,
}

impl PathsConfig {
    pub fn mp3_dir(&self) -> PathBuf {
        expand(&self.mp3_dir)
    }

    pub fn json_dir(&self) -> PathBuf {
        expand(&self.json_dir)
    }

    pub fn xml_dir(&self) -> PathBuf {
        expand(&self.xml_dir)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("", "", "tarr-annunciator")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            mp3_dir: data_dir.join("mp3").to_string_lossy().into_owned(),
            json_dir: data_dir.join("json").to_string_lossy().into_owned(),
            xml_dir: data_dir.join("xml").to_string_lossy().into_owned(),
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Audio playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: crate::constants::audio::DEFAULT_VOLUME,
        }
    }
}

/// Queue engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_history: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_history: crate::constants::queue::DEFAULT_MAX_HISTORY,
        }
    }
}

/// Lightning monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightningConfig {
    pub enabled: bool,
    pub url: String,
    pub fetch_interval_secs: u64,
    pub timeout_secs: u64,
}

impl LightningConfig {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            url: self.url.clone(),
            fetch_interval: Duration::from_secs(self.fetch_interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            fetch_interval_secs: crate::constants::lightning::DEFAULT_FETCH_INTERVAL.as_secs(),
            timeout_secs: crate::constants::lightning::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.audio.volume, crate::constants::audio::DEFAULT_VOLUME);
        assert_eq!(
            config.queue.max_history,
            crate::constants::queue::DEFAULT_MAX_HISTORY
        );
        assert!(!config.lightning.enabled);
        assert_eq!(config.lightning.fetch_interval_secs, 60);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).expect("Failed to serialize config");

        let deserialized: Config =
            serde_json::from_str(&json).expect("Failed to deserialize config");

        assert_eq!(config.audio.volume, deserialized.audio.volume);
        assert_eq!(config.queue.max_history, deserialized.queue.max_history);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test-config.json");

        let original_config = Config::default();
        original_config
            .save(&config_path)
            .expect("Failed to save config");

        assert!(config_path.exists());

        let loaded_config = {
            let content =
                std::fs::read_to_string(&config_path).expect("Failed to read config file");
            serde_json::from_str::<Config>(&content).expect("Failed to parse config")
        };

        assert_eq!(original_config.audio.volume, loaded_config.audio.volume);
        assert_eq!(original_config.paths.mp3_dir, loaded_config.paths.mp3_dir);
    }

    #[test]
    fn test_paths_expand_tilde() {
        let paths = PathsConfig {
            mp3_dir: "~/annunciator/mp3".into(),
            json_dir: "/srv/json".into(),
            xml_dir: "/srv/xml".into(),
        };

        assert!(!paths.mp3_dir().to_string_lossy().starts_with('~'));
        assert_eq!(paths.json_dir(), PathBuf::from("/srv/json"));
    }

    #[test]
    fn test_lightning_config_converts_to_monitor_config() {
        let lightning = LightningConfig {
            enabled: true,
            url: "https://detector.example.com/feed.xml".into(),
            fetch_interval_secs: 30,
            timeout_secs: 5,
        };

        let monitor = lightning.monitor_config();
        assert_eq!(monitor.url, "https://detector.example.com/feed.xml");
        assert_eq!(monitor.fetch_interval, Duration::from_secs(30));
        assert_eq!(monitor.timeout, Duration::from_secs(5));
    }
}
