//! Application configuration for Sitetrail.
//!
//! User config lives at `~/.sitetrail/sitetrail.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SitetrailError};
use crate::types::NavSettings;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitetrail.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitetrail";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "sitetrail.db";

/// Default maximum characters of the path shown in an outline label.
pub const DEFAULT_LABEL_WIDTH: usize = 80;

// ---------------------------------------------------------------------------
// Config structs (matching sitetrail.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Durable storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outline display settings.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Initial navigation settings, used the first time settings are read.
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. Empty means `~/.sitetrail/sitetrail.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// `[display]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Maximum characters of the display path in an outline label.
    #[serde(default = "default_label_width")]
    pub label_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            label_width: default_label_width(),
        }
    }
}

fn default_label_width() -> usize {
    DEFAULT_LABEL_WIDTH
}

/// `[navigation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_true")]
    pub nesting_enabled: bool,

    #[serde(default = "default_back_steps")]
    pub back_steps: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            nesting_enabled: true,
            back_steps: default_back_steps(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_back_steps() -> u32 {
    1
}

impl From<&NavigationConfig> for NavSettings {
    fn from(config: &NavigationConfig) -> Self {
        NavSettings {
            nesting_enabled: config.nesting_enabled,
            back_steps: config.back_steps,
        }
        .clamped()
    }
}

impl AppConfig {
    /// Resolve the database path: explicit override, then config, then default.
    pub fn database_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }
        match self.storage.database_path.as_deref() {
            Some(p) if !p.trim().is_empty() => Ok(expand_home(p)),
            _ => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitetrail/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| SitetrailError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitetrail/sitetrail.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SitetrailError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SitetrailError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SitetrailError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SitetrailError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SitetrailError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
