//! S3 object storage backend. The logical name travels as object metadata so
//! a blob's display name survives without any separate index.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage::{StorageAdapter, StoredBlob, StoredFile};

const NAME_METADATA_KEY: &str = "name";

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Builds a client from the standard AWS environment (credentials chain,
    /// `AWS_REGION`) plus `AWS_S3_BUCKET` for the bucket name.
    pub async fn from_env() -> Result<Self, StorageError> {
        let bucket = std::env::var("AWS_S3_BUCKET")
            .map_err(|_| StorageError::Backend("AWS_S3_BUCKET is not set".to_string()))?;
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = Client::new(&shared);

        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => tracing::info!("Connected to S3 bucket {}", bucket),
            Err(e) => tracing::warn!(
                "Could not verify bucket {}: {}. Will attempt operations anyway.",
                bucket,
                e
            ),
        }

        Ok(Self { client, bucket })
    }

    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StorageAdapter for S3Storage {
    async fn save(&self, name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let meta = StoredFile::issue(name, data.len() as u64);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&meta.id)
            .metadata(NAME_METADATA_KEY, name)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("put_object failed: {}", e)))?;
        Ok(meta)
    }

    async fn load(&self, id: &str) -> Result<Option<StoredBlob>, StorageError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NoSuchKey") || msg.contains("404") {
                    return Ok(None);
                }
                return Err(StorageError::Backend(format!("get_object failed: {}", e)));
            }
        };

        let name = response
            .metadata()
            .and_then(|m| m.get(NAME_METADATA_KEY))
            .cloned()
            .unwrap_or_else(|| "file".to_string());
        let created_at = response
            .last_modified()
            .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
            .unwrap_or_else(Utc::now);

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("object body read failed: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(Some(StoredBlob {
            meta: StoredFile {
                id: id.to_string(),
                name,
                size: data.len() as u64,
                created_at,
            },
            data,
        }))
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        // S3 DeleteObject on a missing key succeeds, so idempotence is free.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("delete_object failed: {}", e)))?;
        Ok(())
    }

    async fn list(&self) -> Result<Option<Vec<StoredFile>>, StorageError> {
        let mut metas = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("list_objects failed: {}", e)))?;

            for obj in response.contents() {
                let Some(key) = obj.key() else { continue };
                metas.push(StoredFile {
                    id: key.to_string(),
                    name: "file".to_string(),
                    size: obj.size().unwrap_or(0) as u64,
                    created_at: obj
                        .last_modified()
                        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
                        .unwrap_or_else(Utc::now),
                });
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(Some(metas))
    }
}
