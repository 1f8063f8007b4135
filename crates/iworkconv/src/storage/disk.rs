//! Local-disk storage. Each blob lives in a flat directory under its
//! identifier, with a `<id>.meta.json` sidecar carrying the logical name and
//! creation time so metadata survives process restarts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage::{StorageAdapter, StoredBlob, StoredFile};

const META_SUFFIX: &str = ".meta.json";

pub struct DiskStorage {
    base: PathBuf,
}

impl DiskStorage {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.base.join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.base.join(format!("{}{}", id, META_SUFFIX))
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base)
            .await
            .map_err(|e| StorageError::Io {
                path: self.base.clone(),
                source: e,
            })
    }

    /// Identifiers are UUIDs minted by this adapter. Anything else is
    /// rejected before it can reach the filesystem.
    fn valid_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    }

    async fn read_sidecar(&self, id: &str, blob_path: &Path) -> StoredFile {
        match tokio::fs::read(self.meta_path(id)).await {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(meta) => return meta,
                Err(e) => log::warn!("Corrupt metadata sidecar for blob {}: {}", id, e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to read metadata sidecar for blob {}: {}", id, e),
        }

        // Blob written by an older version or sidecar lost: reconstruct what
        // the filesystem still knows.
        let (size, created_at) = match tokio::fs::metadata(blob_path).await {
            Ok(md) => {
                let created = md
                    .modified()
                    .ok()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(Utc::now);
                (md.len(), created)
            }
            Err(_) => (0, Utc::now()),
        };
        StoredFile {
            id: id.to_string(),
            name: "file".to_string(),
            size,
            created_at,
        }
    }
}

#[async_trait]
impl StorageAdapter for DiskStorage {
    async fn save(&self, name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        self.ensure_dir().await?;
        let meta = StoredFile::issue(name, data.len() as u64);

        let blob_path = self.blob_path(&meta.id);
        tokio::fs::write(&blob_path, data)
            .await
            .map_err(|e| StorageError::Io {
                path: blob_path.clone(),
                source: e,
            })?;

        let meta_path = self.meta_path(&meta.id);
        let sidecar = serde_json::to_vec(&meta)
            .map_err(|e| StorageError::Backend(format!("metadata encoding failed: {}", e)))?;
        tokio::fs::write(&meta_path, sidecar)
            .await
            .map_err(|e| StorageError::Io {
                path: meta_path,
                source: e,
            })?;

        Ok(meta)
    }

    async fn load(&self, id: &str) -> Result<Option<StoredBlob>, StorageError> {
        if !Self::valid_id(id) {
            return Ok(None);
        }
        let blob_path = self.blob_path(id);
        let data = match tokio::fs::read(&blob_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io {
                    path: blob_path,
                    source: e,
                })
            }
        };

        let meta = self.read_sidecar(id, &blob_path).await;
        Ok(Some(StoredBlob { meta, data }))
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        if !Self::valid_id(id) {
            return Ok(());
        }
        for path in [self.blob_path(id), self.meta_path(id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io { path, source: e }),
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Option<Vec<StoredFile>>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.base).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Some(Vec::new())),
            Err(e) => {
                return Err(StorageError::Io {
                    path: self.base.clone(),
                    source: e,
                })
            }
        };

        let mut metas = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| StorageError::Io {
            path: self.base.clone(),
            source: e,
        })? {
            let file_name = entry.file_name();
            let Some(id) = file_name.to_str() else {
                continue;
            };
            if id.ends_with(META_SUFFIX) || !Self::valid_id(id) {
                continue;
            }
            metas.push(self.read_sidecar(id, &entry.path()).await);
        }
        Ok(Some(metas))
    }
}
