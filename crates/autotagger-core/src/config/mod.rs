//! Configuration management for autotagger.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file only
//! overrides the keys it names.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::filter::FilterSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the model registry inside the model directory.
pub const REGISTRY_FILENAME: &str = "model.json";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Input discovery settings
    pub processing: ProcessingConfig,

    /// Large-batch streaming settings
    pub pipeline: PipelineConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Threshold defaults and always-keep tokens
    pub filter: FilterSettings,

    /// Initial session flags
    pub session: SessionConfig,

    /// Report and sidecar settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Tagger models available to the CLI
    pub models: Vec<ModelSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            processing: ProcessingConfig::default(),
            pipeline: PipelineConfig::default(),
            limits: LimitsConfig::default(),
            filter: FilterSettings::default(),
            session: SessionConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            models: ModelSpec::defaults(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.autotagger.autotagger/config.toml
    /// - Linux: ~/.config/autotagger/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\autotagger\config\config.toml
    ///
    /// Falls back to ~/.autotagger/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "autotagger", "autotagger")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".autotagger").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Path of the JSON model registry.
    pub fn registry_path(&self) -> PathBuf {
        self.model_dir().join(REGISTRY_FILENAME)
    }

    /// Look up a configured model by name.
    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
