//! Settings management for cellframe.
//!
//! This module provides:
//! - TOML settings file loading from `~/.cellframe/config.toml`
//! - Validation of user-entered values at the settings-edit boundary
//! - A shared, explicitly passed settings handle
//!
//! # Settings File
//!
//! ```toml
//! version = "1"
//!
//! # Target frames per second for animated overlays (>= 1)
//! refresh_rate = 5
//!
//! # Background tick rate, 20 ticks = 1s (1..=20)
//! tick_rate = 2
//!
//! # Log debug / verbose records to latest.log (restart required)
//! debug = false
//! verbose = false
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Highest accepted tick rate.
pub const MAX_TICK_RATE: u32 = 20;

/// Name of the per-user data directory under `$HOME`.
const DATA_DIR: &str = ".cellframe";

/// Errors raised when a user edits a numeric setting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Please enter a valid value. Got: {0:?}")]
    NotANumber(String),

    #[error("Value cannot be set below 1. Set: ({0})")]
    InvalidRefreshRate(u64),

    #[error("Value out of range (1-{max}). Set: ({0})", max = MAX_TICK_RATE)]
    TickRateOutOfRange(u64),
}

/// Errors raised while reading or writing the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoHomeDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings snapshot consumed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// File format version
    pub version: String,
    /// Target frames per second for animated overlays
    pub refresh_rate: u32,
    /// Background tick rate (20 ticks = 1s)
    pub tick_rate: u32,
    /// Log debug records
    pub debug: bool,
    /// Log verbose records
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            refresh_rate: 5,
            tick_rate: 2,
            debug: false,
            verbose: false,
        }
    }
}

/// Settings handle shared between the engine and overlay callbacks
pub type SharedSettings = Arc<RwLock<Settings>>;

impl Settings {
    /// Load settings from the default location, creating the file with defaults if missing.
    ///
    /// Any read or parse failure falls back to defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => {
                if !path.exists() {
                    let defaults = Self::default();
                    if let Err(e) = defaults.save_to(&path) {
                        warn!("Could not write default settings: {}", e);
                    }
                    return defaults;
                }
                Self::load_from(&path).unwrap_or_else(|e| {
                    warn!("Falling back to default settings: {}", e);
                    Self::default()
                })
            }
            None => Self::default(),
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings.sanitized())
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoHomeDir)?;
        self.save_to(&path)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace values a hand-edited file may carry outside their valid range.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.refresh_rate == 0 {
            warn!("refresh_rate must be at least 1, using {}", defaults.refresh_rate);
            self.refresh_rate = defaults.refresh_rate;
        }
        if !(1..=MAX_TICK_RATE).contains(&self.tick_rate) {
            warn!(
                "tick_rate {} outside 1..={}, using {}",
                self.tick_rate, MAX_TICK_RATE, defaults.tick_rate
            );
            self.tick_rate = defaults.tick_rate;
        }
        self
    }

    /// Wrap into a shared handle
    pub fn into_shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }

    /// Get config file path
    fn config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }
}

/// Parse a new target FPS entered by the user.
pub fn parse_refresh_rate(input: &str) -> Result<u32, SettingsError> {
    let value = parse_digits(input)?;
    if value < 1 {
        return Err(SettingsError::InvalidRefreshRate(value));
    }
    u32::try_from(value).map_err(|_| SettingsError::NotANumber(input.to_string()))
}

/// Parse a new tick rate entered by the user.
pub fn parse_tick_rate(input: &str) -> Result<u32, SettingsError> {
    let value = parse_digits(input)?;
    if value < 1 || value > u64::from(MAX_TICK_RATE) {
        return Err(SettingsError::TickRateOutOfRange(value));
    }
    // Bounded by MAX_TICK_RATE above
    Ok(value as u32)
}

/// Accept a non-empty run of ASCII digits only.
fn parse_digits(input: &str) -> Result<u64, SettingsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SettingsError::NotANumber(input.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| SettingsError::NotANumber(input.to_string()))
}

/// Per-user data directory, created on first use
pub fn data_dir() -> Option<PathBuf> {
    let home = home_dir()?;
    let dir = home.join(DATA_DIR);
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_rate_validation() {
        assert_eq!(parse_refresh_rate("60"), Ok(60));
        assert_eq!(parse_refresh_rate(" 5 "), Ok(5));
        assert_eq!(parse_refresh_rate("0"), Err(SettingsError::InvalidRefreshRate(0)));
        assert!(matches!(parse_refresh_rate(""), Err(SettingsError::NotANumber(_))));
        assert!(matches!(parse_refresh_rate("-3"), Err(SettingsError::NotANumber(_))));
        assert!(matches!(parse_refresh_rate("fast"), Err(SettingsError::NotANumber(_))));
        assert!(matches!(
            parse_refresh_rate("99999999999999999999999"),
            Err(SettingsError::NotANumber(_))
        ));
    }

    #[test]
    fn test_tick_rate_validation() {
        assert_eq!(parse_tick_rate("1"), Ok(1));
        assert_eq!(parse_tick_rate("20"), Ok(20));
        assert_eq!(parse_tick_rate("21"), Err(SettingsError::TickRateOutOfRange(21)));
        assert_eq!(parse_tick_rate("0"), Err(SettingsError::TickRateOutOfRange(0)));
        assert!(matches!(parse_tick_rate("2.5"), Err(SettingsError::NotANumber(_))));
    }

    #[test]
    fn test_sanitize_out_of_range_values() {
        let settings = Settings {
            refresh_rate: 0,
            tick_rate: 50,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.refresh_rate, 5);
        assert_eq!(settings.tick_rate, 2);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let settings = Settings {
            refresh_rate: 30,
            tick_rate: 4,
            debug: true,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "refresh_rate = 12\n").unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.refresh_rate, 12);
        assert_eq!(loaded.tick_rate, 2);
        assert!(!loaded.verbose);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "refresh_rate = \"lots\"").unwrap();

        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse(_))));
    }
}
