//! On-demand ZIP bundling of stored attachments.
//!
//! Per-file fetches run concurrently, so bundling N files costs the slowest
//! blob read rather than the sum. Files are appended to the archive in the
//! order their fetches complete; member order is non-deterministic across
//! runs and consumers reconstruct meaning from file names, not position.

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use casetrack_core::attachment::is_valid_blob_id;
use casetrack_store::BlobStore;

/// How long a bundle build may run before giving up on slow blob reads.
pub const BUNDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// One requested archive member: blob id plus an optional display name.
/// The name falls back to `file-<id>` when absent or empty.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Every requested file failed; there is nothing worth returning.
    #[error("no valid files to archive")]
    NoValidFiles,

    #[error("archive build timed out after {}s", BUNDLE_TIMEOUT.as_secs())]
    Timeout,

    #[error("zip encoding failed: {0}")]
    Encoder(String),
}

/// A completed bundle plus its success accounting. `total` counts the
/// well-formed entries that were attempted; malformed ids are filtered out
/// before counting.
#[derive(Debug)]
pub struct ArchiveOutput {
    pub bytes: Vec<u8>,
    pub succeeded: usize,
    pub total: usize,
}

/// Typed outcome of one per-file fetch task.
enum FileOutcome {
    Fetched { name: String, data: Bytes },
    Failed { file_id: String, reason: String },
}

/// Build a ZIP archive from the given entries.
///
/// Per-file failures (missing blob, read error, empty content) are logged and
/// counted but never abort the batch. Zero successes yields
/// [`ArchiveError::NoValidFiles`]; encoder failures propagate as
/// [`ArchiveError::Encoder`].
pub async fn build_archive(
    store: Arc<dyn BlobStore>,
    entries: Vec<ArchiveEntry>,
) -> Result<ArchiveOutput, ArchiveError> {
    tokio::time::timeout(BUNDLE_TIMEOUT, build_inner(store, entries))
        .await
        .map_err(|_| ArchiveError::Timeout)?
}

async fn build_inner(
    store: Arc<dyn BlobStore>,
    entries: Vec<ArchiveEntry>,
) -> Result<ArchiveOutput, ArchiveError> {
    let entries: Vec<ArchiveEntry> = entries
        .into_iter()
        .filter(|e| {
            let ok = is_valid_blob_id(&e.file_id);
            if !ok {
                warn!(file_id = %e.file_id, "skipping malformed blob id");
            }
            ok
        })
        .collect();
    let total = entries.len();

    let mut tasks = JoinSet::new();
    for entry in entries {
        let store = store.clone();
        tasks.spawn(async move { fetch_file(store, entry).await });
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut succeeded = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(FileOutcome::Fetched { name, data }) => {
                zip.start_file(name, options)
                    .map_err(|e| ArchiveError::Encoder(e.to_string()))?;
                zip.write_all(&data)
                    .map_err(|e| ArchiveError::Encoder(e.to_string()))?;
                succeeded += 1;
            }
            Ok(FileOutcome::Failed { file_id, reason }) => {
                warn!(%file_id, reason, "file skipped in bundle");
            }
            Err(e) => {
                warn!("bundle fetch task failed: {e}");
            }
        }
    }

    if succeeded == 0 {
        return Err(ArchiveError::NoValidFiles);
    }

    let cursor = zip
        .finish()
        .map_err(|e| ArchiveError::Encoder(e.to_string()))?;
    Ok(ArchiveOutput {
        bytes: cursor.into_inner(),
        succeeded,
        total,
    })
}

async fn fetch_file(store: Arc<dyn BlobStore>, entry: ArchiveEntry) -> FileOutcome {
    let name = entry
        .file_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("file-{}", entry.file_id));

    match store.metadata(&entry.file_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return FileOutcome::Failed {
                file_id: entry.file_id,
                reason: "blob not found".into(),
            }
        }
        Err(e) => {
            return FileOutcome::Failed {
                file_id: entry.file_id,
                reason: format!("metadata lookup: {e}"),
            }
        }
    }

    match store.get(&entry.file_id).await {
        Ok(data) if data.is_empty() => FileOutcome::Failed {
            file_id: entry.file_id,
            reason: "blob is empty".into(),
        },
        Ok(data) => FileOutcome::Fetched { name, data },
        Err(e) => FileOutcome::Failed {
            file_id: entry.file_id,
            reason: format!("read: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casetrack_store::{LocalStore, StoreConfig};

    fn test_store(dir: &std::path::Path) -> Arc<dyn BlobStore> {
        Arc::new(LocalStore::new(&StoreConfig {
            endpoint_url: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            local_data_dir: Some(dir.to_string_lossy().to_string()),
        }))
    }

    async fn put(store: &Arc<dyn BlobStore>, name: &str, data: &[u8]) -> String {
        store
            .put(name, "application/octet-stream", Bytes::copy_from_slice(data))
            .await
            .unwrap()
    }

    fn entry(id: &str, name: Option<&str>) -> ArchiveEntry {
        ArchiveEntry {
            file_id: id.into(),
            file_name: name.map(String::from),
        }
    }

    fn zip_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn bundles_all_present_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let a = put(&store, "a.txt", b"aaa").await;
        let b = put(&store, "b.txt", b"bbb").await;

        let output = build_archive(
            store,
            vec![entry(&a, Some("a.txt")), entry(&b, Some("b.txt"))],
        )
        .await
        .unwrap();

        assert_eq!(output.succeeded, 2);
        assert_eq!(output.total, 2);
        let mut names = zip_names(&output.bytes);
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn missing_blob_is_counted_but_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let a = put(&store, "a.txt", b"aaa").await;

        let output = build_archive(
            store,
            vec![
                entry(&a, Some("a.txt")),
                entry("d4d4d4d4d4d4d4d4d4d4d4d4", Some("gone.txt")),
            ],
        )
        .await
        .unwrap();

        assert_eq!(output.succeeded, 1);
        assert_eq!(output.total, 2);
        assert_eq!(zip_names(&output.bytes), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn malformed_ids_are_filtered_before_counting() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let a = put(&store, "x.pdf", b"pdf bytes").await;

        let output = build_archive(
            store,
            vec![entry(&a, Some("x.pdf")), entry("bad-id", None)],
        )
        .await
        .unwrap();

        assert_eq!(output.succeeded, 1);
        assert_eq!(output.total, 1); // malformed entry filtered pre-count
        assert_eq!(zip_names(&output.bytes), vec!["x.pdf"]);
    }

    #[tokio::test]
    async fn zero_successes_is_no_valid_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let err = build_archive(
            store,
            vec![
                entry("d4d4d4d4d4d4d4d4d4d4d4d4", None),
                entry("not-even-hex", None),
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ArchiveError::NoValidFiles));
    }

    #[tokio::test]
    async fn empty_input_is_no_valid_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let err = build_archive(store, vec![]).await.unwrap_err();
        assert!(matches!(err, ArchiveError::NoValidFiles));
    }

    #[tokio::test]
    async fn empty_blob_counts_as_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let empty = put(&store, "empty.txt", b"").await;
        let full = put(&store, "full.txt", b"content").await;

        let output = build_archive(
            store,
            vec![entry(&empty, Some("empty.txt")), entry(&full, Some("full.txt"))],
        )
        .await
        .unwrap();

        assert_eq!(output.succeeded, 1);
        assert_eq!(output.total, 2);
        assert_eq!(zip_names(&output.bytes), vec!["full.txt"]);
    }

    #[tokio::test]
    async fn missing_name_falls_back_to_file_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let a = put(&store, "orig.bin", b"data").await;

        let output = build_archive(store, vec![entry(&a, None)]).await.unwrap();
        assert_eq!(zip_names(&output.bytes), vec![format!("file-{a}")]);
    }

    #[tokio::test]
    async fn archive_members_round_trip_content() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let a = put(&store, "a.txt", b"alpha content").await;

        let output = build_archive(store, vec![entry(&a, Some("a.txt"))])
            .await
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(output.bytes)).unwrap();
        let mut file = archive.by_name("a.txt").unwrap();
        let mut content = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut content).unwrap();
        assert_eq!(content, b"alpha content");
    }
}
