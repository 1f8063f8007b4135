//! Bundling stored blobs into a single ZIP download.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::StorageError;
use crate::storage::StorageAdapter;

/// Packs the blobs behind `ids` into an in-memory ZIP archive, one entry per
/// blob under its logical name. Unknown ids are skipped; duplicate names get
/// a numeric suffix so no entry shadows another.
pub async fn zip_blobs(
    storage: &Arc<dyn StorageAdapter>,
    ids: &[String],
) -> Result<Vec<u8>, StorageError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used_names: HashSet<String> = HashSet::new();

    for id in ids {
        let Some(blob) = storage.load(id).await? else {
            log::warn!("Skipping unknown blob {} while bundling", id);
            continue;
        };

        let mut entry_name = blob.meta.name.clone();
        let mut counter = 1;
        while !used_names.insert(entry_name.clone()) {
            entry_name = match blob.meta.name.rsplit_once('.') {
                Some((stem, ext)) => format!("{} ({}).{}", stem, counter, ext),
                None => format!("{} ({})", blob.meta.name, counter),
            };
            counter += 1;
        }

        writer
            .start_file(entry_name.as_str(), options)
            .map_err(|e| StorageError::Backend(format!("zip entry failed: {}", e)))?;
        writer
            .write_all(&blob.data)
            .map_err(|e| StorageError::Backend(format!("zip write failed: {}", e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| StorageError::Backend(format!("zip finish failed: {}", e)))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::io::Read;

    fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut out = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((entry.name().to_string(), data));
        }
        out
    }

    #[tokio::test]
    async fn test_bundle_contains_every_blob() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
        let a = storage.save("doc.pdf", b"first").await.unwrap();
        let b = storage.save("sheet.csv", b"second").await.unwrap();

        let bytes = zip_blobs(&storage, &[a.id, b.id]).await.unwrap();
        let entries = entries(&bytes);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("doc.pdf".to_string(), b"first".to_vec()));
        assert_eq!(entries[1], ("sheet.csv".to_string(), b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_skipped() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
        let a = storage.save("doc.pdf", b"data").await.unwrap();

        let bytes = zip_blobs(&storage, &[a.id, "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(entries(&bytes).len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_names_get_suffixes() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
        let a = storage.save("doc.pdf", b"one").await.unwrap();
        let b = storage.save("doc.pdf", b"two").await.unwrap();

        let bytes = zip_blobs(&storage, &[a.id, b.id]).await.unwrap();
        let names: Vec<String> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["doc.pdf".to_string(), "doc (1).pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_bundle_is_a_valid_archive() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
        let bytes = zip_blobs(&storage, &[]).await.unwrap();
        assert!(entries(&bytes).is_empty());
    }
}
