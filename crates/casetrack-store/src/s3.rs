use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{id_is_safe, new_blob_id, BlobMeta, BlobStore, StoreConfig, StoreError};

/// S3-compatible blob store. Same key layout as `LocalStore`: bytes at
/// `blobs/<id>`, metadata JSON at `blobs/<id>.meta`.
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: config.region.clone().unwrap_or_else(|| "us-east-1".into()),
            endpoint: config.endpoint_url.clone().unwrap_or_default(),
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Internal(format!("credentials: {e}")))?;

        let bucket_name = config
            .bucket
            .as_deref()
            .ok_or_else(|| StoreError::Internal("bucket name required".into()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StoreError::Internal(format!("bucket: {e}")))?
            .with_path_style();

        Ok(Self { bucket })
    }
}

fn data_key(id: &str) -> String {
    format!("blobs/{id}")
}

fn meta_key(id: &str) -> String {
    format!("blobs/{id}.meta")
}

fn map_s3_error(e: S3Error) -> StoreError {
    StoreError::Internal(format!("s3: {e}"))
}

#[async_trait]
impl BlobStore for S3Store {
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, StoreError> {
        let id = new_blob_id();
        let meta = BlobMeta {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            length: data.len() as i64,
        };
        self.bucket
            .put_object_with_content_type(data_key(&id), &data, content_type)
            .await
            .map_err(map_s3_error)?;
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| StoreError::Internal(format!("encode meta: {e}")))?;
        self.bucket
            .put_object_with_content_type(meta_key(&id), &meta_json, "application/json")
            .await
            .map_err(map_s3_error)?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Bytes, StoreError> {
        if !id_is_safe(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let response = match self.bucket.get_object(data_key(id)).await {
            Ok(r) => r,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(map_s3_error(e)),
        };
        if response.status_code() == 404 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if response.status_code() >= 400 {
            return Err(StoreError::Internal(format!(
                "s3 get {}: status {}",
                id,
                response.status_code()
            )));
        }
        Ok(Bytes::from(response.to_vec()))
    }

    async fn metadata(&self, id: &str) -> Result<Option<BlobMeta>, StoreError> {
        if !id_is_safe(id) {
            return Ok(None);
        }
        let response = match self.bucket.get_object(meta_key(id)).await {
            Ok(r) => r,
            Err(S3Error::HttpFailWithBody(404, _)) => return Ok(None),
            Err(e) => return Err(map_s3_error(e)),
        };
        if response.status_code() == 404 {
            return Ok(None);
        }
        if response.status_code() >= 400 {
            return Err(StoreError::Internal(format!(
                "s3 get meta {}: status {}",
                id,
                response.status_code()
            )));
        }
        let meta: BlobMeta = serde_json::from_slice(response.as_slice())
            .map_err(|e| StoreError::Internal(format!("decode meta for {id}: {e}")))?;
        Ok(Some(meta))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if !id_is_safe(id) {
            return Ok(());
        }
        self.bucket
            .delete_object(data_key(id))
            .await
            .map_err(map_s3_error)?;
        self.bucket
            .delete_object(meta_key(id))
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bucket_produces_error() {
        let config = StoreConfig {
            endpoint_url: Some("http://localhost:3900".into()),
            region: Some("garage".into()),
            bucket: None,
            access_key_id: Some("key".into()),
            secret_access_key: Some("secret".into()),
            local_data_dir: None,
        };
        let err = S3Store::new(&config).unwrap_err();
        assert!(err.to_string().contains("bucket name required"));
    }

    #[test]
    fn valid_config_creates_store() {
        let config = StoreConfig {
            endpoint_url: Some("http://localhost:3900".into()),
            region: Some("garage".into()),
            bucket: Some("test-bucket".into()),
            access_key_id: Some("key".into()),
            secret_access_key: Some("secret".into()),
            local_data_dir: None,
        };
        assert!(S3Store::new(&config).is_ok());
    }

    #[test]
    fn key_layout_matches_local_store() {
        assert_eq!(data_key("abc"), "blobs/abc");
        assert_eq!(meta_key("abc"), "blobs/abc.meta");
    }

    // -- S3 integration tests (require a running Garage/MinIO) --

    fn s3_config() -> Option<StoreConfig> {
        let config = StoreConfig::from_env();
        if config.is_s3() {
            Some(config)
        } else {
            None
        }
    }

    #[tokio::test]
    #[ignore]
    async fn s3_crud_roundtrip() {
        let config = s3_config().expect("S3 not configured — skipped via #[ignore]");
        let store = S3Store::new(&config).unwrap();

        let id = store
            .put("roundtrip.txt", "text/plain", Bytes::from("hello s3"))
            .await
            .unwrap();

        let data = store.get(&id).await.unwrap();
        assert_eq!(data.as_ref(), b"hello s3");

        let meta = store.metadata(&id).await.unwrap().unwrap();
        assert_eq!(meta.filename, "roundtrip.txt");
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.length, 8);

        store.delete(&id).await.unwrap();
        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    #[ignore]
    async fn s3_missing_blob() {
        let config = s3_config().expect("S3 not configured — skipped via #[ignore]");
        let store = S3Store::new(&config).unwrap();

        let err = store.get("a1a1a1a1a1a1a1a1a1a1a1a1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store
            .metadata("a1a1a1a1a1a1a1a1a1a1a1a1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn s3_delete_nonexistent_is_noop() {
        let config = s3_config().expect("S3 not configured — skipped via #[ignore]");
        let store = S3Store::new(&config).unwrap();
        store.delete("a1a1a1a1a1a1a1a1a1a1a1a1").await.unwrap();
    }
}
