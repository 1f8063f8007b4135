//! Content-addressed blob storage with interchangeable backends.
//!
//! Every backend hands out opaque UUID identifiers at save time; a blob is
//! immutable for the lifetime of its identifier. The rest of the crate only
//! sees `Arc<dyn StorageAdapter>`, never a concrete backend.

pub mod disk;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, StorageDriver};
use crate::error::StorageError;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Metadata issued when a blob is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Opaque identifier; the only external handle to the blob.
    pub id: String,
    /// Logical (display) name, typically the original file name.
    pub name: String,
    /// Byte size of the content.
    pub size: u64,
    /// When the blob was saved.
    pub created_at: DateTime<Utc>,
}

/// A loaded blob: metadata plus raw content.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub meta: StoredFile,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Persists `data` under a fresh identifier.
    async fn save(&self, name: &str, data: &[u8]) -> Result<StoredFile, StorageError>;

    /// Loads a blob by identifier. `None` means the id is unknown.
    async fn load(&self, id: &str) -> Result<Option<StoredBlob>, StorageError>;

    /// Deletes a blob. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Direct-access URL for the blob, when the backend can mint one.
    async fn url(&self, _id: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    /// Enumerates stored blobs. `None` means the backend cannot enumerate,
    /// which also exempts it from garbage collection.
    async fn list(&self) -> Result<Option<Vec<StoredFile>>, StorageError> {
        Ok(None)
    }
}

impl StoredFile {
    pub(crate) fn issue(name: &str, size: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            size,
            created_at: Utc::now(),
        }
    }
}

/// Selects and constructs the backend named by the config.
pub async fn from_config(config: &Config) -> Result<Arc<dyn StorageAdapter>, StorageError> {
    match config.storage_driver {
        StorageDriver::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageDriver::Disk => Ok(Arc::new(DiskStorage::new(&config.disk_path))),
        #[cfg(feature = "s3")]
        StorageDriver::S3 => Ok(Arc::new(S3Storage::from_env().await?)),
        #[cfg(not(feature = "s3"))]
        StorageDriver::S3 => Err(StorageError::Backend(
            "built without the 's3' feature".to_string(),
        )),
    }
}
