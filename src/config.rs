use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::form::{DEFAULT_FAILURE_MESSAGE, SubmitOptions};
use crate::persistence::{FileStore, InMemoryStore, KeyValueStore, StorageError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub submission: SubmissionConfig,
    pub storage: StorageConfig,
}

impl FormsConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub latency_ms: u64,
    pub success_reset_ms: u64,
    pub failure_message: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1_500,
            success_reset_ms: 5_000,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl From<&SubmissionConfig> for SubmitOptions {
    fn from(config: &SubmissionConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.latency_ms),
            success_reset: Duration::from_millis(config.success_reset_ms),
            failure_message: Cow::Owned(config.failure_message.clone()),
        }
    }
}

/// Without a `path` the store lives in memory for the life of the process.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    pub quota_bytes: Option<usize>,
}

impl StorageConfig {
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, StorageError> {
        match (&self.path, self.quota_bytes) {
            (Some(path), _) => Ok(Arc::new(FileStore::open(path)?)),
            (None, Some(quota)) => Ok(Arc::new(InMemoryStore::with_quota(quota))),
            (None, None) => Ok(Arc::new(InMemoryStore::new())),
        }
    }
}
