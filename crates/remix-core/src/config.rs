//! Application configuration
//!
//! YAML config covering the remote service endpoints and the engine rate.
//! Loading is forgiving: a missing or unparseable file falls back to defaults
//! with a warning, so a bad edit never prevents startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_SAMPLE_RATE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemixConfig {
    pub api: ApiConfig,
    pub engine: EngineConfig,
}

impl Default for RemixConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// Remote service endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Stem splitter upload endpoint
    pub splitter_url: String,
    /// YouTube-to-MP3 converter endpoint
    pub converter_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            splitter_url: "http://localhost:5000/upload".to_string(),
            converter_url: "http://localhost:5000/convert".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate all tracks are resampled to and mixed at
    pub sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Default config file location: `~/.config/remix/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("remix")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// A missing file yields defaults silently; an unreadable or unparseable
/// file yields defaults with a warning.
pub fn load_config(path: &Path) -> RemixConfig {
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return RemixConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str(&contents) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
                RemixConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            RemixConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config(config: &RemixConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, RemixConfig::default());
        assert_eq!(config.engine.sample_rate, 44_100);
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api: [not, a, mapping").unwrap();

        let config = load_config(&path);
        assert_eq!(config, RemixConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = RemixConfig::default();
        config.api.splitter_url = "https://stems.example.com/upload".to_string();
        config.engine.sample_rate = 48_000;

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "engine:\n  sample_rate: 22050\n").unwrap();

        let config = load_config(&path);
        assert_eq!(config.engine.sample_rate, 22_050);
        assert_eq!(config.api, ApiConfig::default());
    }
}
