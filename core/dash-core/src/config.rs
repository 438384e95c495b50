//! Runtime configuration (`config.toml`).
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:5000/api/v1/"
//! page_size = 200
//! timeout_secs = 30
//! ```
//!
//! Every field is optional. A missing file means defaults; environment
//! variables (`TRAILBLAZER_API_URL`, `TRAILBLAZER_PAGE_SIZE`) win over the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trailblazer_dash_protocol::DEFAULT_PAGE_SIZE;
use url::Url;

use crate::error::ConfigError;
use crate::storage::StorageConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1/";
pub const ENV_API_URL: &str = "TRAILBLAZER_API_URL";
pub const ENV_PAGE_SIZE: &str = "TRAILBLAZER_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DashConfig {
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 30,
        }
    }
}

impl DashConfig {
    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_API_URL).filter(|value| !value.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            self.api.page_size = match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_PAGE_SIZE.to_string(),
                        value: raw,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// API base URL, with a trailing slash so relative routes resolve under it.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.api.base_url.trim();
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
            value: raw.to_string(),
            source,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

/// Loads `path`, or the default config file when `None`.
///
/// A missing file yields defaults. Environment overrides are not applied here.
pub fn load_config(
    path: Option<&Path>,
    storage: &StorageConfig,
) -> Result<DashConfig, ConfigError> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => storage.config_file(),
    };

    if !config_path.exists() {
        return Ok(DashConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    toml::from_str::<DashConfig>(&content).map_err(|err| ConfigError::Malformed {
        path: config_path,
        details: err.to_string(),
    })
}
