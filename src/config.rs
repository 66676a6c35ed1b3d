use crate::settings::parse_hour;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("blocks_per_hour must divide 60 evenly, got {0}")]
    InvalidBlocksPerHour(u32),
    #[error("invalid default sleep time {0:?}")]
    InvalidDefaultSleep(String),
    #[error("refresh_interval_ms must be positive")]
    ZeroRefreshInterval,
}

/// Startup context passed to every planner operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub blocks_per_hour: u32,
    pub default_sleep_start: String,
    pub default_sleep_end: String,
    pub refresh_interval_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            blocks_per_hour: 4,
            default_sleep_start: "02:00".into(),
            default_sleep_end: "10:00".into(),
            refresh_interval_ms: 60_000,
        }
    }
}

impl PlannerConfig {
    pub fn minutes_per_block(&self) -> u32 {
        60 / self.blocks_per_hour
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks_per_hour == 0 || 60 % self.blocks_per_hour != 0 {
            return Err(ConfigError::InvalidBlocksPerHour(self.blocks_per_hour));
        }
        for raw in [&self.default_sleep_start, &self.default_sleep_end] {
            parse_hour(raw).map_err(|_| ConfigError::InvalidDefaultSleep(raw.clone()))?;
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PlannerConfig,
    pub path: PathBuf,
    pub from_file: bool,
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(crate::storage::project_dirs()?.config_dir().join("config.yml"))
}

pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    let (config, from_file) = if path.exists() {
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let config: PlannerConfig = if data.trim().is_empty() {
            PlannerConfig::default()
        } else {
            serde_yaml::from_str(&data).context("parsing config file")?
        };
        (config, true)
    } else if explicit.is_some() {
        anyhow::bail!("config file {:?} does not exist", path);
    } else {
        (PlannerConfig::default(), false)
    };
    config
        .validate()
        .with_context(|| format!("validating {:?}", path))?;
    Ok(LoadedConfig {
        config,
        path,
        from_file,
    })
}
