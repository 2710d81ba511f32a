use crate::error::ConfigError;
use crate::models::{clamp_volume, Channel};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Player configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory the bundled audio lives under
    pub resource_root: PathBuf,
    /// Extension assumed for track names given without one
    pub default_extension: String,
    pub poll_interval_ms: u64,
    pub book_volume: f32,
    pub music_volume: f32,
    pub book_tracks: Vec<String>,
    pub music_tracks: Vec<String>,
    pub startup_book: Option<String>,
    pub startup_music: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let mut book_tracks: Vec<String> = (1..=19).map(|i| format!("book{}.mp3", i)).collect();
        // shipped without an extension
        book_tracks[16] = "book17".to_string();

        Self {
            resource_root: dirs::data_dir()
                .map(|dir| dir.join("simulisten"))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Audio"),
            default_extension: "mp3".to_string(),
            poll_interval_ms: 200,
            book_volume: 1.0,
            music_volume: 1.0,
            book_tracks,
            music_tracks: (1..=8).map(|i| format!("music{}.mp3", i)).collect(),
            startup_book: Some("book1.mp3".to_string()),
            startup_music: Some("music1.mp3".to_string()),
        }
    }
}

impl PlayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn volume(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Book => clamp_volume(self.book_volume),
            Channel::Music => clamp_volume(self.music_volume),
        }
    }

    pub fn tracks(&self, channel: Channel) -> &[String] {
        match channel {
            Channel::Book => &self.book_tracks,
            Channel::Music => &self.music_tracks,
        }
    }

    pub fn startup_track(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Book => self.startup_book.as_deref(),
            Channel::Music => self.startup_music.as_deref(),
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from `~/.config/simulisten/config.toml`, writing defaults on first run
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_path(Self::get_config_path()?)
    }

    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let first_run = !config_path.exists();
        let config = Self::load_config(&config_path)?;
        let manager = Self {
            config,
            config_path,
        };

        if first_run {
            manager.save_config()?;
        }
        Ok(manager)
    }

    /// Load from `config_path`, or the default location when `None`.
    /// A file that cannot be read or parsed leaves the built-in defaults in
    /// effect and is not overwritten.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        let loaded = match &config_path {
            Some(path) => Self::with_path(path.clone()),
            None => Self::new(),
        };

        loaded.unwrap_or_else(|e| {
            warn!("Configuration not loaded ({}), using defaults", e);
            Self {
                config: PlayerConfig::default(),
                config_path: config_path
                    .or_else(|| Self::get_config_path().ok())
                    .unwrap_or_default(),
            }
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut PlayerConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("simulisten");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.toml"))
    }

    pub fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;
        Ok(())
    }
}
