use std::time::Duration;

use powerwatch_common::env_or;
use reqwest::{Client, Url};
use thiserror::Error;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub port: u16,
    pub api_base_url: String,
    pub upstream_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 3000u16),
            api_base_url: env_or("API_BASE_URL", DEFAULT_API_BASE_URL.to_string()),
            upstream_timeout: Duration::from_secs(env_or("UPSTREAM_TIMEOUT_SECS", 30u64)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid API_BASE_URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http client init failed: {0}")]
    Client(#[source] reqwest::Error),
}

/// Immutable per-process state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub api_base_url: Url,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> Result<Self, StateError> {
        let api_base_url = Url::parse(&config.api_base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| StateError::InvalidBaseUrl(config.api_base_url.clone()))?;
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(StateError::Client)?;
        Ok(Self {
            client,
            api_base_url,
        })
    }

    /// Joins path segments onto the backend base URL, encoding each segment.
    /// Dot segments are resolved by the URL parser, so callers must reject
    /// them first.
    pub fn upstream_url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
