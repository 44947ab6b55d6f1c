use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub export: ExportConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Label the host page uses for the local user's own entries.
    /// Substituted with the captured display name at block creation.
    pub self_label: String,
    /// Character delta that splits a long same-speaker turn. Empirically
    /// tied to how the host page truncates long caption nodes.
    pub turn_split_chars: usize,
    /// Leave captions off and only record whatever the user turns on.
    pub manual_captions: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            self_label: "You".to_string(),
            turn_split_chars: 250,
            manual_captions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for plain-text meeting exports. Empty = data dir default.
    pub directory: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
        }
    }
}

impl ExportConfig {
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        if self.directory.is_empty() {
            global::exports_dir()
        } else {
            Ok(PathBuf::from(&self.directory))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Base URL of the analysis backend.
    pub endpoint: String,
    /// Optional translation language passed with analysis requests.
    pub language: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/api".to_string(),
            language: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
