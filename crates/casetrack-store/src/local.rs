use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{id_is_safe, new_blob_id, BlobMeta, BlobStore, StoreConfig, StoreError};

/// Filesystem-backed blob store. Bytes live at `blobs/<id>`, metadata as a
/// JSON sidecar at `blobs/<id>.meta`.
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Self {
        let base_dir = config
            .local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.base_dir.join("blobs").join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.base_dir.join("blobs").join(format!("{id}.meta"))
    }
}

fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("casetrack")
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, StoreError> {
        let id = new_blob_id();
        let path = self.data_path(&id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Internal(format!("mkdir: {e}")))?;
        }
        let meta = BlobMeta {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            length: data.len() as i64,
        };
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))?;
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| StoreError::Internal(format!("encode meta: {e}")))?;
        tokio::fs::write(self.meta_path(&id), meta_json)
            .await
            .map_err(|e| StoreError::Internal(format!("write meta for {id}: {e}")))?;
        debug!(blob_id = %id, filename, size = data.len(), "stored blob");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Bytes, StoreError> {
        if !id_is_safe(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let path = self.data_path(id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::Internal(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn metadata(&self, id: &str) -> Result<Option<BlobMeta>, StoreError> {
        if !id_is_safe(id) {
            return Ok(None);
        }
        let path = self.meta_path(id);
        match tokio::fs::read(&path).await {
            Ok(raw) => {
                let meta: BlobMeta = serde_json::from_slice(&raw)
                    .map_err(|e| StoreError::Internal(format!("decode meta for {id}: {e}")))?;
                Ok(Some(meta))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Internal(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if !id_is_safe(id) {
            return Ok(());
        }
        for path in [self.data_path(id), self.meta_path(id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::Internal(format!(
                        "delete {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(dir: &std::path::Path) -> LocalStore {
        let config = StoreConfig {
            endpoint_url: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            local_data_dir: Some(dir.to_string_lossy().to_string()),
        };
        LocalStore::new(&config)
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let id = store
            .put("hello.txt", "text/plain", Bytes::from("hello world"))
            .await
            .unwrap();
        assert_eq!(id.len(), 24);

        let data = store.get(&id).await.unwrap();
        assert_eq!(data.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn put_records_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let id = store
            .put("report.pdf", "application/pdf", Bytes::from(vec![1u8; 64]))
            .await
            .unwrap();

        let meta = store.metadata(&id).await.unwrap().unwrap();
        assert_eq!(meta.filename, "report.pdf");
        assert_eq!(meta.content_type, "application/pdf");
        assert_eq!(meta.length, 64);
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let err = store.get("a1a1a1a1a1a1a1a1a1a1a1a1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn metadata_missing_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let meta = store.metadata("a1a1a1a1a1a1a1a1a1a1a1a1").await.unwrap();
        assert!(meta.is_none());
    }

    #[tokio::test]
    async fn unsafe_id_is_treated_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let err = store.get("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.metadata("../x").await.unwrap().is_none());
        store.delete("../x").await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_blob_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let id = store
            .put("x.bin", "application/octet-stream", Bytes::from("data"))
            .await
            .unwrap();
        store.delete(&id).await.unwrap();

        assert!(matches!(
            store.get(&id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(store.metadata(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        store.delete("a1a1a1a1a1a1a1a1a1a1a1a1").await.unwrap();
    }

    #[tokio::test]
    async fn two_puts_get_distinct_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let a = store
            .put("a.txt", "text/plain", Bytes::from("a"))
            .await
            .unwrap();
        let b = store
            .put("b.txt", "text/plain", Bytes::from("b"))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.get(&a).await.unwrap().as_ref(), b"a");
        assert_eq!(store.get(&b).await.unwrap().as_ref(), b"b");
    }

    #[tokio::test]
    async fn binary_content_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let id = store
            .put("blob.bin", "application/octet-stream", Bytes::from(payload.clone()))
            .await
            .unwrap();
        let data = store.get(&id).await.unwrap();
        assert_eq!(data.as_ref(), payload.as_slice());
    }
}
