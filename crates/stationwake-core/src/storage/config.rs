//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Monitoring policy (threshold, interval, sample timeout, accuracy)
//! - Alert preferences (volume, vibration pattern, custom sound)
//! - Background task notification appearance
//! - Theme preference
//!
//! Configuration is stored at `~/.config/stationwake/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::monitor::MonitorConfig;
use crate::runner::RunnerConfig;

/// Alert side-effect preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: u32,
    #[serde(default = "default_true")]
    pub vibration: bool,
    /// Duration of the arrival vibration pattern in milliseconds.
    #[serde(default = "default_vibration_ms")]
    pub vibration_ms: u64,
    /// Path to a custom arrival sound file (optional).
    /// If set, this file is played instead of the bundled cue.
    #[serde(default)]
    pub custom_sound: Option<String>,
}

/// UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub dark_mode: bool,
}

fn default_true() -> bool {
    true
}
fn default_volume() -> u32 {
    50
}
fn default_vibration_ms() -> u64 {
    4_500
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
            vibration: true,
            vibration_ms: default_vibration_ms(),
            custom_sound: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { dark_mode: true }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/stationwake/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            Err(_) => {
                let config = Self::default();
                config.save()?;
                Ok(config)
            }
        }
    }

    /// Load from disk, returning defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Read a value as a display string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let root = serde_json::to_value(self).ok()?;
        let mut node = &root;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        Some(match node {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Update a value by dot-separated key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value does not parse
    /// as the type the key holds, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// `set` without the save; the value must keep the type the key
    /// already holds.
    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        let mut root =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        let (parents, leaf) = match key.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, key),
        };
        let mut node = &mut root;
        if let Some(parents) = parents {
            for part in parents.split('.') {
                node = node.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let object = node.as_object_mut().ok_or_else(unknown)?;
        let existing = object.get(leaf).ok_or_else(unknown)?;

        let parsed = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse()
                    .map_err(|_| invalid("expected true or false"))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::from(n)
                } else if let Ok(n) = value.parse::<f64>() {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid("not a finite number"))?
                } else {
                    return Err(invalid("expected a number"));
                }
            }
            serde_json::Value::Null | serde_json::Value::String(_) => {
                serde_json::Value::String(value.to_string())
            }
            _ => serde_json::from_str(value).map_err(|e| invalid(&e.to_string()))?,
        };
        object.insert(leaf.to_string(), parsed);

        *self = serde_json::from_value(root).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
