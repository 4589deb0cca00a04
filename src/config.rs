//! # Configuration Module
//!
//! Data directory handling and the persisted `config.json`.
//!
//! ## Data Storage
//!
//! Cadence keeps its files in the platform-standard data directory:
//! - Linux: `~/.local/share/cadence/`
//! - macOS: `~/Library/Application Support/cadence/`
//! - Windows: `%APPDATA%\cadence\`
//!
//! Setting `CADENCE_DATA_DIR` overrides the location.
//!
//! ## Files
//!
//! - `config.json`: user settings, see [`Config`]
//! - `scores.db`: listening scores (unless `scores_db` points elsewhere)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithm::SamplerConfig;
use crate::coordinator::CoordinatorSettings;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "CADENCE_DATA_DIR";

const CONFIG_FILE: &str = "config.json";
const SCORES_FILE: &str = "scores.db";

/// Returns the data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The cadence subdirectory cannot be created due to permissions
///
/// # Examples
///
/// ```no_run
/// use cadence::config::get_data_dir;
///
/// let data_dir = get_data_dir()?;
/// println!("Data location: {}", data_dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!(
                "Could not determine system data directory. Set {DATA_DIR_ENV} to choose one."
            ))?
            .join("cadence"),
    };

    fs::create_dir_all(&data_dir).with_context(|| {
        format!(
            "Failed to create Cadence data directory at {}. Please check file permissions.",
            data_dir.display()
        )
    })?;

    Ok(data_dir)
}

/// User settings stored in `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library root scanned at startup
    pub music_dir: Option<PathBuf>,
    /// Listening score database, defaults to `<data dir>/scores.db`
    pub scores_db: Option<PathBuf>,
    /// Audio file extensions picked up by the scanner
    pub extensions: Vec<String>,
    /// Quiet period before a scan publishes a catalog update
    pub debounce_ms: u64,
    /// First phase of the end-of-track timer
    pub settle_delay_ms: u64,
    /// Target length of an automatic queue
    pub auto_queue_size: usize,
    /// Floor weight every track gets in an automatic queue
    pub random_weight: f64,
    /// Output volume, 0.0 to 1.0
    pub volume: f64,
    /// Volume change per step
    pub volume_step: f64,
    /// MPD's `music_directory`, for relative path translation
    pub mpd_music_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_dir: None,
            scores_db: None,
            extensions: ["mp3", "ogg", "flac", "m4a"].iter().map(ToString::to_string).collect(),
            debounce_ms: 250,
            settle_delay_ms: 2000,
            auto_queue_size: 200,
            random_weight: 5.0,
            volume: 0.5,
            volume_step: 0.02,
            mpd_music_dir: None,
        }
    }
}

impl Config {
    /// Score database location, falling back to the data directory
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn scores_db_path(&self) -> Result<PathBuf> {
        match &self.scores_db {
            Some(path) => Ok(path.clone()),
            None => Ok(get_data_dir()?.join(SCORES_FILE)),
        }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            volume: self.volume,
            volume_step: self.volume_step,
            sampler: SamplerConfig {
                target: self.auto_queue_size,
                random_weight: self.random_weight,
            },
        }
    }
}

/// Loads `config.json` from the data directory, defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<Config> {
    load_config_from(&get_data_dir()?.join(CONFIG_FILE))
}

/// Loads a config file at `path`, defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Writes `config` to `config.json` in the data directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, &get_data_dir()?.join(CONFIG_FILE))
}

/// Writes `config` as pretty JSON to `path`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, text).with_context(|| format!("Failed to write config file {}", path.display()))?;
    info!("Saved config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = load_config_from(&temp_dir.path().join("config.json"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce(), Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn test_round_trip_through_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        let config = Config {
            music_dir: Some(PathBuf::from("/srv/music")),
            volume: 0.8,
            ..Config::default()
        };

        save_config_to(&config, &path)?;
        assert_eq!(load_config_from(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "auto_queue_size": 50 }"#)?;

        let config = load_config_from(&path)?;
        assert_eq!(config.auto_queue_size, 50);
        assert_eq!(config.extensions.len(), 4);
        assert_eq!(config.coordinator_settings().sampler.target, 50);
        Ok(())
    }

    #[test]
    fn test_invalid_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json")?;
        assert!(load_config_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_explicit_scores_db_wins() -> Result<()> {
        let config = Config {
            scores_db: Some(PathBuf::from("/tmp/elsewhere.db")),
            ..Config::default()
        };
        assert_eq!(config.scores_db_path()?, PathBuf::from("/tmp/elsewhere.db"));
        Ok(())
    }
}
