//! Configuration for dualdeck
//!
//! Stored as TOML in the user's config directory.
//! Default location: ~/.config/dualdeck/config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::player::{PlayerOptions, DEFAULT_MAX_SPEED};
use crate::audio::types::SpeedMode;
use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub decks: DeckConfig,
    pub playlist: PlaylistConfig,
}

/// Output device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Substring of the output device name (empty for the default device)
    pub device_name: String,
    /// Preferred sample rate; the device default is used when unset or unsupported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Frames per mixer block
    pub block_size: u32,
    /// Output channel count
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            sample_rate: None,
            block_size: 512,
            channels: 2,
        }
    }
}

/// Per-deck playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Upper stop of the speed control
    pub max_speed: f64,
    pub speed_mode: SpeedMode,
    /// How often the transport poller runs
    pub poll_interval_ms: u64,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            speed_mode: SpeedMode::Varispeed,
            poll_interval_ms: 100,
        }
    }
}

impl DeckConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions {
            max_speed: self.max_speed,
            speed_mode: self.speed_mode,
        }
    }
}

/// Playlist handoff mailbox settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub enabled: bool,
    /// Two-line mailbox file written by the playlist
    pub mailbox_path: PathBuf,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mailbox_path: PathBuf::from("playlist.txt"),
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dualdeck")
            .join("config.toml")
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)
    }
}
