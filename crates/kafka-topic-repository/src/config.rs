use std::fs::read_to_string;
use std::io::Error as IoError;
use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::{Result, TopicRepositoryError};
use crate::retry::RetryPolicy;

/// max names accepted by one batch detail call
const DEFAULT_BATCH_SIZE: usize = 100;
/// batch detail results are cached remotely, so stale answers are retried after this delay
const DEFAULT_BATCH_RETRY_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_BATCH_RETRY_ATTEMPTS: u32 = 10;
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_retry_delay() -> Duration {
    DEFAULT_BATCH_RETRY_DELAY
}

fn default_batch_retry_attempts() -> u32 {
    DEFAULT_BATCH_RETRY_ATTEMPTS
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IoError: {0}")]
    Io(#[from] IoError),
    #[error("TomlError: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning of the repository's batching and retries.
///
/// Build it with [`RepositoryConfig::builder()`] or load it from TOML:
///
/// ```toml
/// batch-size = 50
/// batch-retry-delay = "2s"
/// tick-interval = "500ms"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned", build_fn(private, name = "build_impl", validate = "Self::validate"))]
#[serde(rename_all = "kebab-case", default)]
pub struct RepositoryConfig {
    /// Maximum number of topic names sent in one batch detail call.
    #[builder(default = "default_batch_size()")]
    pub batch_size: usize,
    /// Delay between retries of a batch that came back incomplete.
    #[builder(default = "default_batch_retry_delay()")]
    #[serde(with = "humantime_serde")]
    pub batch_retry_delay: Duration,
    /// Attempts made per chunk before its requests fail.
    #[builder(default = "default_batch_retry_attempts()")]
    pub batch_retry_attempts: u32,
    /// Optional wall-clock budget for retrying a single chunk.
    #[builder(default, setter(strip_option))]
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub batch_retry_timeout: Option<Duration>,
    /// How often the worker drains the request queue.
    #[builder(default = "default_tick_interval()")]
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_retry_delay: default_batch_retry_delay(),
            batch_retry_attempts: default_batch_retry_attempts(),
            batch_retry_timeout: None,
            tick_interval: default_tick_interval(),
        }
    }
}

impl RepositoryConfig {
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }

    pub fn load_from<T: AsRef<Path>>(path: T) -> Result<Self, LoadConfigError> {
        let path_ref = path.as_ref();
        debug!(?path_ref, "loading repository config");
        let file_str = read_to_string(path_ref)?;
        Self::load_str(&file_str)
    }

    pub fn load_str(config: &str) -> Result<Self, LoadConfigError> {
        let config: Self = toml::from_str(config)?;
        config.check().map_err(LoadConfigError::Invalid)?;
        Ok(config)
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.batch_retry_attempts,
            delay: self.batch_retry_delay,
            timeout: self.batch_retry_timeout,
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch size must be at least 1".to_owned());
        }
        if self.batch_retry_attempts == 0 {
            return Err("batch retry attempts must be at least 1".to_owned());
        }
        if self.tick_interval.is_zero() {
            return Err("tick interval must not be zero".to_owned());
        }
        Ok(())
    }
}

impl RepositoryConfigBuilder {
    pub fn build(self) -> Result<RepositoryConfig> {
        self.build_impl()
            .map_err(|err| TopicRepositoryError::Config(err.to_string()))
    }

    fn validate(&self) -> Result<(), String> {
        if self.batch_size == Some(0) {
            return Err("batch size must be at least 1".to_owned());
        }
        if self.batch_retry_attempts == Some(0) {
            return Err("batch retry attempts must be at least 1".to_owned());
        }
        if self.tick_interval.is_some_and(|interval| interval.is_zero()) {
            return Err("tick interval must not be zero".to_owned());
        }
        Ok(())
    }
}
