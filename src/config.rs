use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::transport::default_user_agent;

pub const DEFAULT_CONFIG_FILE: &str = "batchget.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output_root: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub progress: Option<bool>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub output_root: Utf8PathBuf,
    pub timeout: Duration,
    pub concurrency: Option<NonZeroUsize>,
    pub progress: bool,
    pub user_agent: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_root: Utf8PathBuf::from("."),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: None,
            progress: false,
            user_agent: default_user_agent(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_root: Option<Utf8PathBuf>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub progress: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `batchget.json` from the current directory when no
    /// path is given. Only an explicitly named file is required to exist.
    pub fn load(path: Option<&str>) -> Result<Config, BatchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BatchError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| BatchError::ConfigParse(err.to_string()))
    }

    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, BatchError> {
        let mut config = Self::load(path)?;
        if let Some(root) = overrides.output_root {
            config.output_root = Some(root.into_string());
        }
        if let Some(timeout) = overrides.timeout_secs {
            config.timeout_secs = Some(timeout);
        }
        if let Some(concurrency) = overrides.concurrency {
            config.concurrency = Some(concurrency);
        }
        if overrides.progress {
            config.progress = Some(true);
        }
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, BatchError> {
        let defaults = ResolvedConfig::default();

        let concurrency = config
            .concurrency
            .map(|value| {
                NonZeroUsize::new(value).ok_or_else(|| {
                    BatchError::ConfigParse("concurrency must be at least 1".to_string())
                })
            })
            .transpose()?;

        let user_agent = match config.user_agent {
            Some(agent) if agent.trim().is_empty() => {
                return Err(BatchError::ConfigParse(
                    "user_agent must not be empty".to_string(),
                ));
            }
            Some(agent) => agent,
            None => defaults.user_agent,
        };

        Ok(ResolvedConfig {
            output_root: config
                .output_root
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_root),
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            concurrency,
            progress: config.progress.unwrap_or(defaults.progress),
            user_agent,
        })
    }
}
