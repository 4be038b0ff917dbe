mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// Metadata recorded alongside a blob at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub filename: String,
    pub content_type: String,
    pub length: i64,
}

/// A store for binary attachments addressed by opaque identifiers.
///
/// Identifiers are assigned by the store at write time (24-character
/// lowercase hex). Callers keep the id in the owning record; the store never
/// learns which record a blob belongs to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, returning its newly assigned identifier.
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, StoreError>;

    /// Read a blob's bytes. Returns `StoreError::NotFound` if absent.
    async fn get(&self, id: &str) -> Result<Bytes, StoreError>;

    /// Look up a blob's metadata, returning `None` if it does not exist.
    async fn metadata(&self, id: &str) -> Result<Option<BlobMeta>, StoreError>;

    /// Delete a blob. No-op if absent.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Generate a fresh blob identifier: 12 random bytes, lowercase hex.
pub(crate) fn new_blob_id() -> String {
    use rand::RngCore;
    let mut raw = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut raw);
    let mut id = String::with_capacity(24);
    for b in raw {
        id.push_str(&format!("{b:02x}"));
    }
    id
}

/// Reject ids that could escape the store's key space. Store-assigned ids are
/// pure hex, so anything with a path separator or other punctuation is bogus.
pub(crate) fn id_is_safe(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

// -- Configuration --

/// Configuration for the blob store backend.
pub struct StoreConfig {
    /// S3-compatible endpoint URL. When `None`, use local filesystem.
    pub endpoint_url: Option<String>,
    /// S3 region.
    pub region: Option<String>,
    /// S3 bucket name.
    pub bucket: Option<String>,
    /// AWS access key ID.
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    pub secret_access_key: Option<String>,
    /// Local filesystem base directory (used when S3 is not configured).
    pub local_data_dir: Option<String>,
}

impl StoreConfig {
    /// Build from environment variables. If `CASETRACK_S3_ENDPOINT` (or
    /// `AWS_ENDPOINT_URL`) is set along with credentials and a bucket name,
    /// use S3. Otherwise, fall back to local filesystem.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: std::env::var("CASETRACK_S3_ENDPOINT")
                .or_else(|_| std::env::var("AWS_ENDPOINT_URL"))
                .ok(),
            region: std::env::var("CASETRACK_S3_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .ok(),
            bucket: std::env::var("CASETRACK_S3_BUCKET").ok(),
            access_key_id: std::env::var("CASETRACK_S3_ACCESS_KEY_ID")
                .or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_access_key: std::env::var("CASETRACK_S3_SECRET_ACCESS_KEY")
                .or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            local_data_dir: std::env::var("CASETRACK_DATA_DIR").ok(),
        }
    }

    pub fn is_s3(&self) -> bool {
        self.endpoint_url.is_some()
            && self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && self.bucket.is_some()
    }
}

// -- Factory --

/// Create a `BlobStore` from configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn BlobStore>, StoreError> {
    if config.is_s3() {
        #[cfg(feature = "s3")]
        {
            Ok(Arc::new(S3Store::new(config)?))
        }
        #[cfg(not(feature = "s3"))]
        {
            Err(StoreError::Internal(
                "S3 configuration detected but the 's3' feature is not enabled".into(),
            ))
        }
    } else {
        Ok(Arc::new(LocalStore::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_blob_id_is_24_lowercase_hex() {
        let id = new_blob_id();
        assert_eq!(id.len(), 24);
        assert!(id
            .bytes()
            .all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn new_blob_ids_are_unique() {
        assert_ne!(new_blob_id(), new_blob_id());
    }

    #[test]
    fn id_safety_rejects_path_components() {
        assert!(id_is_safe("a1a1a1a1a1a1a1a1a1a1a1a1"));
        assert!(!id_is_safe(""));
        assert!(!id_is_safe("../../../etc/passwd"));
        assert!(!id_is_safe("a/b"));
    }

    #[test]
    fn store_config_is_s3_requires_all_fields() {
        let config = StoreConfig {
            endpoint_url: Some("http://localhost:3900".into()),
            region: Some("garage".into()),
            bucket: Some("casetrack".into()),
            access_key_id: Some("key".into()),
            secret_access_key: Some("secret".into()),
            local_data_dir: None,
        };
        assert!(config.is_s3());

        let config = StoreConfig {
            bucket: None,
            ..config
        };
        assert!(!config.is_s3());

        let config = StoreConfig {
            endpoint_url: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            local_data_dir: None,
        };
        assert!(!config.is_s3());
    }

    #[test]
    fn create_store_local_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            endpoint_url: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            local_data_dir: Some(tmp.path().to_string_lossy().to_string()),
        };
        assert!(!config.is_s3());
        assert!(create_store(&config).is_ok());
    }
}
