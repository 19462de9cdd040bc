mod adapter;
mod store;

use thiserror::Error;

pub use adapter::{
    MirrorSource, MockEndpoint, PersistedRecord, PersistenceAdapter, ProfileMirror,
    RecordDestination,
};
pub use store::{FileStore, InMemoryStore, KeyValueStore};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored value under '{key}' is not valid JSON")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to format record timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}
