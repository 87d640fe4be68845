//! Bridge configuration management
//!
//! An optional TOML file supplies defaults for every command-line option.
//! Command-line flags always win over the file.

use crate::options::{DEFAULT_STREAM_NAME, DEFAULT_VERBOSITY, Options};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub headset: HeadsetSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadsetSettings {
    /// Serial port; when unset libDSI reads `DSISerialPort`
    #[serde(default)]
    pub port: Option<String>,
    /// Comma-separated sensor list
    #[serde(default)]
    pub montage: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Device diagnostic verbosity
    #[serde(default = "HeadsetSettings::default_verbosity")]
    pub verbosity: i32,
    /// Path to the libDSI shared library
    #[serde(default)]
    pub library: Option<PathBuf>,
}

impl Default for HeadsetSettings {
    fn default() -> Self {
        Self {
            port: None,
            montage: None,
            reference: None,
            verbosity: Self::default_verbosity(),
            library: None,
        }
    }
}

impl HeadsetSettings {
    fn default_verbosity() -> i32 {
        DEFAULT_VERBOSITY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// LSL stream name
    #[serde(default = "StreamSettings::default_name")]
    pub name: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
        }
    }
}

impl StreamSettings {
    fn default_name() -> String {
        DEFAULT_STREAM_NAME.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl BridgeConfig {
    /// Load configuration from the specified path, or the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(anyhow!("No configuration file found, using defaults"));
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: BridgeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    ///
    /// Nothing is logged here; the returned source is reported once logging
    /// is up.
    pub fn load_or_default() -> (Self, ConfigSource) {
        match Self::load(None) {
            Ok(config) => (config, ConfigSource::File(Self::default_path())),
            Err(e) => (Self::default(), ConfigSource::Defaults(e.to_string())),
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("dsi2lsl").join("config.toml")
        } else {
            PathBuf::from(".config/dsi2lsl/config.toml")
        }
    }

    fn validate(&self) -> Result<()> {
        validate_log_level(&self.logging.level)?;

        if self.stream.name.is_empty() {
            return Err(anyhow!("Stream name must not be empty"));
        }

        Ok(())
    }
}

fn validate_log_level(level: &str) -> Result<()> {
    if !VALID_LOG_LEVELS.contains(&level) {
        return Err(anyhow!(
            "Invalid log level '{}', must be one of: {}",
            level,
            VALID_LOG_LEVELS.join(", ")
        ));
    }
    Ok(())
}

/// Where the file layer of the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// No usable file; carries the reason
    Defaults(String),
}

impl ConfigSource {
    /// Report the source; call after the subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                tracing::info!("Loaded configuration from: {}", path.display())
            }
            ConfigSource::Defaults(reason) => {
                tracing::debug!("Failed to load config: {}, using defaults", reason)
            }
        }
    }
}

/// Load configuration from a user-supplied path, expanding `~` and `$VAR`
pub fn load_config(path: &str) -> Result<(BridgeConfig, ConfigSource)> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand config path: {}", path))?;
    let path = PathBuf::from(expanded.as_ref());
    let config = BridgeConfig::load(Some(path.clone()))?;
    Ok((config, ConfigSource::File(path)))
}

/// Effective run settings after merging flags over the config file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: Option<String>,
    pub montage: Option<String>,
    pub reference: Option<String>,
    pub verbosity: i32,
    pub stream_name: String,
    pub log_level: String,
    pub library: Option<PathBuf>,
}

impl Settings {
    /// Merge command-line options over a loaded configuration
    ///
    /// A flag given with an empty value still overrides the file for port,
    /// montage and reference, so `--port=` defers to `DSISerialPort` even
    /// when the file names a port. An empty stream name, log level or
    /// library path falls back to the file.
    pub fn merge(options: &Options, config: &BridgeConfig) -> Result<Self> {
        let stream_name = non_empty(options.stream_name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| config.stream.name.clone());

        let log_level = non_empty(options.log_level.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| config.logging.level.clone());
        validate_log_level(&log_level)?;

        let library = match non_empty(options.library_path.as_deref()) {
            Some(path) => Some(PathBuf::from(shellexpand::tilde(path).as_ref())),
            None => config.headset.library.clone(),
        };

        Ok(Self {
            port: options.port.clone().or_else(|| config.headset.port.clone()),
            montage: options
                .montage
                .clone()
                .or_else(|| config.headset.montage.clone()),
            reference: options
                .reference
                .clone()
                .or_else(|| config.headset.reference.clone()),
            verbosity: options.verbosity.unwrap_or(config.headset.verbosity),
            stream_name,
            log_level,
            library,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            montage: None,
            reference: None,
            verbosity: DEFAULT_VERBOSITY,
            stream_name: DEFAULT_STREAM_NAME.to_string(),
            log_level: LoggingSettings::default_level(),
            library: None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = BridgeConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.stream.name, "WS-default");
        assert_eq!(parsed.headset.verbosity, 2);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = BridgeConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_defaults() {
        let settings = Settings::merge(&Options::default(), &BridgeConfig::default()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_default_path_ends_with_app_dir() {
        let path = BridgeConfig::default_path();
        assert!(path.ends_with("dsi2lsl/config.toml"));
    }
}
