use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "com.kogase.dashboard";

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where `data.db` lives; defaults to the app config dir
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults, then `config.toml` if present, then `KOGASE_*` env vars
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup("KOGASE_API_URL").filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(dir) = lookup("KOGASE_DATA_DIR").filter(|v| !v.is_empty()) {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("KOGASE_TIMEOUT_SECS") {
            self.api.timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                field: "KOGASE_TIMEOUT_SECS".to_string(),
                reason: format!("'{}' is not a number of seconds", secs),
            })?;
        }
        Ok(())
    }

    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::app_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn log_dir() -> PathBuf {
        Self::app_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("logs")
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.storage.data_dir.clone().or_else(Self::app_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }
}
