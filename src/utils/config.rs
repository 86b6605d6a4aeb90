//! Configuration management for playcore
//!
//! This module handles loading and managing configuration from config
//! files and environment variables.

use crate::engine::SimulatedProfile;
use crate::player::{PlayerOptions, FRAME_QUEUE_CAPACITY_MAX, FRAME_QUEUE_CAPACITY_MIN};
use crate::utils::error::{IntoPlayerError, PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const VALID_LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default options for every new player
    pub player: PlayerOptions,

    pub logging: LoggingConfig,

    /// Profile for the simulated engine used by the demo binary
    pub engine: SimulatedProfile,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (off, error, warn, info, debug, trace)
    pub level: String,

    /// Log every queued message at info level
    pub report: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            report: false,
        }
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/playcore/config.toml on Unix)
    /// 3. User config file (~/.config/playcore/config.toml on Linux)
    /// 4. Environment variables (PLAYCORE_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        for path in [Self::system_config_path(), Self::user_config_path()]
            .into_iter()
            .flatten()
        {
            if path.exists() {
                log::debug!("Loading config from {}", path.display());
                config.merge_from_file(&path)?;
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load defaults overlaid with a single file, then environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| PlayerError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Merge configuration from a TOML file.
    ///
    /// Tables are merged key by key, so a file only overrides the values it
    /// actually sets and option maps are unioned with what is loaded.
    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        let layer: toml::Value = toml::from_str(&contents).config_err("Failed to parse config file")?;

        let mut merged = toml::Value::try_from(&*self).config_err("Failed to serialize config")?;
        merge_values(&mut merged, layer);
        *self = merged.try_into().config_err("Failed to parse config file")?;

        Ok(())
    }

    /// Apply overrides looked up by environment variable name
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Example: PLAYCORE_MAX_FPS=60
        if let Some(level) = lookup("PLAYCORE_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        if let Some(report) = lookup("PLAYCORE_LOG_REPORT") {
            self.logging.report = matches!(report.as_str(), "1" | "true" | "yes" | "on");
        }

        if let Some(max_fps) = lookup("PLAYCORE_MAX_FPS") {
            self.player.max_fps = max_fps
                .parse()
                .config_err("Invalid PLAYCORE_MAX_FPS")?;
        }

        if let Some(frames) = lookup("PLAYCORE_FRAME_QUEUE_CAPACITY") {
            self.player.frame_queue_capacity = frames
                .parse()
                .config_err("Invalid PLAYCORE_FRAME_QUEUE_CAPACITY")?;
        }

        if let Some(bytes) = lookup("PLAYCORE_MAX_BUFFER_SIZE") {
            self.player.max_buffer_size = bytes
                .parse()
                .config_err("Invalid PLAYCORE_MAX_BUFFER_SIZE")?;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(PlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level, VALID_LOG_LEVELS
            )));
        }

        let frames = self.player.frame_queue_capacity;
        if !(FRAME_QUEUE_CAPACITY_MIN..=FRAME_QUEUE_CAPACITY_MAX).contains(&frames) {
            return Err(PlayerError::Config(format!(
                "Frame queue capacity {} outside [{}, {}]",
                frames, FRAME_QUEUE_CAPACITY_MIN, FRAME_QUEUE_CAPACITY_MAX
            )));
        }

        if self.player.max_fps == 0 {
            return Err(PlayerError::Config("max_fps must be non-zero".to_string()));
        }

        if self.engine.tick_ms == 0 {
            return Err(PlayerError::Config("engine tick must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(unix)]
        return Some(PathBuf::from("/etc/playcore/config.toml"));

        #[cfg(windows)]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("playcore").join("config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("playcore").join("config.toml"))
    }
}

/// Overlay `layer` onto `base`; tables recurse, everything else replaces
fn merge_values(base: &mut toml::Value, layer: toml::Value) {
    match (base, layer) {
        (toml::Value::Table(base), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
