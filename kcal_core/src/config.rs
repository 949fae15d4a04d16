//! Configuration file support for kcal.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/kcal/config.toml`.
//! Every component receives the parts it needs by reference; nothing here is
//! global.

use crate::{Error, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub collections: CollectionsConfig,

    #[serde(default)]
    pub dates: DatesConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Names of the collections in the tabular store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionsConfig {
    #[serde(default = "default_log_collection")]
    pub log: String,

    #[serde(default = "default_profile_collection")]
    pub profile: String,

    #[serde(default = "default_summary_collection")]
    pub summary: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            log: default_log_collection(),
            profile: default_profile_collection(),
            summary: default_summary_collection(),
        }
    }
}

/// Date key configuration.
///
/// `utc_offset_minutes` is the single zone every DateKey is formatted in.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DatesConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl DatesConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Config(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }
}

/// Style hints applied to the status cell of each summary row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_under_marker")]
    pub under_marker: String,

    #[serde(default = "default_over_marker")]
    pub over_marker: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            under_marker: default_under_marker(),
            over_marker: default_over_marker(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("kcal")
}

fn default_log_collection() -> String {
    "log".into()
}

fn default_profile_collection() -> String {
    "profile".into()
}

fn default_summary_collection() -> String {
    "summary".into()
}

fn default_under_marker() -> String {
    "green".into()
}

fn default_over_marker() -> String {
    "red".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Check the values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        self.dates.offset()?;

        let names = [
            &self.collections.log,
            &self.collections.profile,
            &self.collections.summary,
        ];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(Error::Config("collection names must not be empty".into()));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(Error::Config(format!(
                "collection names must be distinct: log={}, profile={}, summary={}",
                names[0], names[1], names[2]
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("kcal").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
