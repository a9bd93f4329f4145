use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::FileTokenStore;

const DEFAULT_GATEWAY_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub gateway_url: String,
    pub token_path: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct FileConfig {
    pub gateway_url: Option<String>,
    pub token_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var("POWERWATCH_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("powerwatch")
        .join("config.toml")
}

pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl DashboardConfig {
    /// Precedence: explicit overrides, then `GATEWAY_URL`, then the file, then defaults.
    pub fn from_sources(
        file: FileConfig,
        env_gateway_url: Option<String>,
        gateway_override: Option<String>,
        token_override: Option<PathBuf>,
    ) -> Self {
        let gateway_url = gateway_override
            .or(env_gateway_url)
            .or(file.gateway_url)
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let token_path = token_override
            .or(file.token_path)
            .unwrap_or_else(FileTokenStore::default_path);
        let timeout = Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        Self {
            gateway_url,
            token_path,
            timeout,
        }
    }

    pub fn load(
        gateway_override: Option<String>,
        token_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let path = resolve_config_path();
        let file = read_file_config(&path)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(Self::from_sources(
            file,
            env::var("GATEWAY_URL").ok(),
            gateway_override,
            token_override,
        ))
    }
}
