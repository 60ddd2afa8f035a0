//! Configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HID device filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HidConfig {
    /// HID Usage Page (QMK Raw HID)
    #[serde(default = "default_usage_page")]
    pub usage_page: u16,
    /// HID Usage ID
    #[serde(default = "default_usage_id")]
    pub usage_id: u16,
    /// Pin discovery to one USB Vendor ID; `None` accepts any vendor
    #[serde(default)]
    pub vendor_id: Option<u16>,
}

fn default_usage_page() -> u16 {
    0xFF60
}
fn default_usage_id() -> u16 {
    0x61
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            usage_page: default_usage_page(),
            usage_id: default_usage_id(),
            vendor_id: None,
        }
    }
}

/// Synchronization engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reconciliation pass interval in milliseconds
    #[serde(default = "default_polling_interval")]
    pub polling_interval_ms: u64,
    /// Settling delay before a restart or a first config read
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Base backoff between start retries (scaled 1x/2x/3x per attempt)
    #[serde(default = "default_restart_backoff")]
    pub restart_backoff_ms: u64,
    /// Maximum start attempts within one restart branch
    #[serde(default = "default_start_retry_limit")]
    pub start_retry_limit: u32,
}

fn default_polling_interval() -> u64 {
    1000
}
fn default_settle_delay() -> u64 {
    800
}
fn default_restart_backoff() -> u64 {
    1000
}
fn default_start_retry_limit() -> u32 {
    3
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval(),
            settle_delay_ms: default_settle_delay(),
            restart_backoff_ms: default_restart_backoff(),
            start_retry_limit: default_start_retry_limit(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HID device filter
    #[serde(default)]
    pub hid: HidConfig,
    /// Engine tuning
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            // Return default config if file doesn't exist
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directories if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "gpk", "GpkCompanion")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hid.usage_page, 0xFF60);
        assert_eq!(config.hid.usage_id, 0x61);
        assert_eq!(config.hid.vendor_id, None);
        assert_eq!(config.sync.polling_interval_ms, 1000);
        assert_eq!(config.sync.settle_delay_ms, 800);
        assert_eq!(config.sync.start_retry_limit, 3);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sync.polling_interval_ms, config.sync.polling_interval_ms);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[sync]\npolling_interval_ms = 250\n").unwrap();
        assert_eq!(parsed.sync.polling_interval_ms, 250);
        assert_eq!(parsed.sync.settle_delay_ms, 800);
        assert_eq!(parsed.hid.usage_page, 0xFF60);
    }
}
