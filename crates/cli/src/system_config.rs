//! Process configuration
//!
//! Loaded once at startup from `config.toml` (next to the executable unless
//! `--config` says otherwise) and never changed afterwards. A missing file is
//! replaced by a template that fails validation until it has been edited.

use anyhow::{Context, Result};
use delivery::{RetryPolicy, S3Settings};
use monitor_core::DEFAULT_ARTIFACT_EXTENSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up next to the executable
pub const CONFIG_FILE_NAME: &str = "config.toml";

const PLACEHOLDER_MONITOR_DIR: &str = "/path/to/monitor";
const PLACEHOLDER_ENDPOINT: &str = "https://s3.example.com";
const PLACEHOLDER_ACCESS_KEY: &str = "your-access-key-id";
const PLACEHOLDER_SECRET_KEY: &str = "your-secret-key";
const PLACEHOLDER_BUCKET: &str = "your-bucket-name";

/// Reasons a configuration is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("Invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Monitor directory does not exist: {0}")]
    MonitorDirMissing(PathBuf),

    #[error("Monitor path is not a directory: {0}")]
    MonitorDirNotADirectory(PathBuf),
}

/// S3-compatible storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: PLACEHOLDER_ENDPOINT.to_string(),
            access_key: PLACEHOLDER_ACCESS_KEY.to_string(),
            secret_key: PLACEHOLDER_SECRET_KEY.to_string(),
            bucket: PLACEHOLDER_BUCKET.to_string(),
            region: "auto".to_string(),
        }
    }
}

/// Full process configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Root whose first-level directories are tracked
    pub monitor_dir: PathBuf,
    /// Quiet window in minutes
    pub delay_minutes: u64,
    /// Upload retries before quarantine
    pub max_retries: u32,
    /// Tasks buffered in the delivery queue
    pub queue_capacity: usize,
    /// Extension of artifacts, without the dot
    pub archive_extension: String,
    /// Snapshot every directory once at startup
    pub initial_backup: bool,
    /// Let deletions and renames restart the quiet window
    pub rearm_on_remove: bool,
    /// First retry backoff step in seconds (0 = no backoff)
    pub retry_base_delay_secs: u64,
    /// Backoff ceiling in seconds
    pub retry_max_delay_secs: u64,
    pub s3: S3Config,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            monitor_dir: PathBuf::from(PLACEHOLDER_MONITOR_DIR),
            delay_minutes: 5,
            max_retries: 3,
            queue_capacity: delivery::DEFAULT_CAPACITY,
            archive_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            initial_backup: true,
            rearm_on_remove: false,
            retry_base_delay_secs: 5,
            retry_max_delay_secs: 60,
            s3: S3Config::default(),
        }
    }
}

impl SystemConfig {
    /// Validate values without touching the filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitor_dir = self.monitor_dir.as_os_str();
        if monitor_dir.is_empty() || monitor_dir == PLACEHOLDER_MONITOR_DIR {
            return Err(ConfigError::NotConfigured("monitor_dir"));
        }

        check_set(&self.s3.endpoint, PLACEHOLDER_ENDPOINT, "S3 endpoint")?;
        check_set(&self.s3.access_key, PLACEHOLDER_ACCESS_KEY, "S3 access key")?;
        check_set(&self.s3.secret_key, PLACEHOLDER_SECRET_KEY, "S3 secret key")?;
        check_set(&self.s3.bucket, PLACEHOLDER_BUCKET, "S3 bucket")?;

        if self.s3.region.trim().is_empty() {
            return Err(ConfigError::NotConfigured("S3 region"));
        }
        if self.delay_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "delay_minutes",
                reason: "must be at least 1",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                reason: "must be at least 1",
            });
        }
        let ext = self.archive_extension.trim();
        if ext.is_empty() || ext.contains('/') || ext.starts_with('.') {
            return Err(ConfigError::Invalid {
                field: "archive_extension",
                reason: "must be a bare extension such as \"rwmod\"",
            });
        }
        if self.retry_max_delay_secs < self.retry_base_delay_secs {
            return Err(ConfigError::Invalid {
                field: "retry_max_delay_secs",
                reason: "must not be smaller than retry_base_delay_secs",
            });
        }

        Ok(())
    }

    /// Check that the monitored root exists and is a directory
    pub fn validate_monitor_dir(&self) -> Result<(), ConfigError> {
        match std::fs::metadata(&self.monitor_dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::MonitorDirNotADirectory(self.monitor_dir.clone())),
            Err(_) => Err(ConfigError::MonitorDirMissing(self.monitor_dir.clone())),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_secs(self.delay_minutes.saturating_mul(60))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.retry_base_delay_secs),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
        }
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            endpoint: self.s3.endpoint.clone(),
            access_key: self.s3.access_key.clone(),
            secret_key: self.s3.secret_key.clone(),
            bucket: self.s3.bucket.clone(),
            region: self.s3.region.clone(),
        }
    }
}

fn check_set(value: &str, placeholder: &str, what: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() || value == placeholder {
        Err(ConfigError::NotConfigured(what))
    } else {
        Ok(())
    }
}

/// Default config location: `config.toml` next to the running executable
pub fn default_config_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to get current executable path")?;
    let dir = exe
        .parent()
        .context("Executable has no parent directory")?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Resolve an explicit `--config` path or fall back to the default
pub fn config_file_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// Read and parse a config file
pub fn load(path: &Path) -> Result<SystemConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&data).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Load the config, writing the template first if the file is missing
pub fn load_or_init(path: &Path) -> Result<SystemConfig> {
    if init_if_missing(path)? {
        tracing::info!("Created config template at {}", path.display());
    }
    load(path)
}

/// Write the template to `path` unless a file is already there
///
/// Returns whether a file was written.
pub fn init_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, example_config())
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(true)
}

/// Template config with placeholder values
pub fn example_config() -> String {
    // Serializing a plain struct of scalars and one table cannot fail
    toml::to_string_pretty(&SystemConfig::default()).unwrap_or_default()
}
