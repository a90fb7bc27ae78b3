use crate::ai::DEFAULT_API_URL;
use crate::model::Model;
use crate::store::default_save_dir;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

/// Where the active API key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Config,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location; a missing file is an empty config
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("parley").join("config.json"))
    }

    /// The environment wins over the config file; blank values are ignored
    pub fn resolve_api_key(&self, env_key: Option<String>) -> Option<(String, KeySource)> {
        let non_blank = |key: &String| !key.trim().is_empty();

        env_key
            .filter(non_blank)
            .map(|key| (key, KeySource::Env))
            .or_else(|| {
                self.api_key
                    .clone()
                    .filter(non_blank)
                    .map(|key| (key, KeySource::Config))
            })
    }

    pub fn api_key_from_env() -> Option<String> {
        std::env::var(API_KEY_ENV).ok()
    }

    pub fn resolve_model(&self, override_model: Option<&str>) -> String {
        override_model
            .map(str::to_string)
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| Model::default().as_str().to_string())
    }

    pub fn resolve_api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn resolve_save_dir(&self, override_dir: Option<PathBuf>) -> PathBuf {
        override_dir
            .or_else(|| self.save_dir.clone())
            .unwrap_or_else(default_save_dir)
    }
}
