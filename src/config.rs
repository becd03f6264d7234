//! Tool configuration, loaded from `~/.storeforge/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::progress::LockOptions;
use crate::sfcli::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base working directory for CLI invocations and scratch files.
    pub base_dir: PathBuf,
    /// Location of the shared status file.
    pub status_file: PathBuf,
    /// Default scratch org definition, relative to the project.
    pub scratch_org_def: PathBuf,
    pub retry: RetrySettings,
    pub lock: LockSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: i32,
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let base_dir = dirs::home_dir()
            .map(|home| home.join(".storeforge"))
            .unwrap_or_else(|| PathBuf::from(".storeforge"));
        Self {
            status_file: base_dir.join("status.json"),
            scratch_org_def: PathBuf::from("config/project-scratch-def.json"),
            base_dir,
            retry: RetrySettings::default(),
            lock: LockSettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_wait: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load the user config, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        match dirs::home_dir() {
            Some(home) => {
                let path = home.join(".storeforge").join("config.toml");
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid config {}: {e}", path.display())))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            retryable_names: Vec::new(),
            delay: self.retry.delay,
        }
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            poll_interval: self.lock.poll_interval,
            max_wait: self.lock.max_wait,
        }
    }
}
