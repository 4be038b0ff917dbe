//! The attachment endpoint.
//!
//! `GET /api/attachments` dispatches purely on which query parameters are
//! present: `fileId` selects a single-file download, `recordId` plus
//! `download=zip` selects a bundle, and `recordId` alone selects a JSON
//! listing. Malformed blob ids are filtered out of listings and bundles
//! rather than failing the request, so partially-corrupt attachment lists
//! stay usable.

use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use casetrack_core::attachment::{is_valid_blob_id, AttachmentCategory, AttachmentRef};
use casetrack_core::case::Case;
use casetrack_service::{CaseService, ServiceError};
use casetrack_store::{BlobStore, StoreError};

use super::cases::to_error;
use super::AppState;
use crate::archive::{build_archive, ArchiveEntry, ArchiveError};

/// Per-file upload cap. Whole files are buffered in memory on both the
/// upload and download paths, so this bounds per-request memory too.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/attachments",
        get(get_attachments)
            .post(upload_attachment)
            .delete(delete_attachment),
    )
}

type RouteError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> RouteError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": message, "error": "invalid_input" })),
    )
}

fn not_found(message: &str) -> RouteError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": message, "error": "not_found" })),
    )
}

fn internal(detail: &str) -> RouteError {
    error!(detail, "attachment request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "internal server error", "error": "internal" })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentQuery {
    record_id: Option<String>,
    file_id: Option<String>,
    download: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
}

fn parse_category(raw: Option<&str>) -> Result<AttachmentCategory, RouteError> {
    match raw {
        None => Ok(AttachmentCategory::Submission),
        Some(s) => AttachmentCategory::from_str(s)
            .ok_or_else(|| bad_request(&format!("unknown attachment category '{s}'"))),
    }
}

async fn get_attachments(
    State(state): State<AppState>,
    Query(q): Query<AttachmentQuery>,
) -> Result<Response, RouteError> {
    if let Some(file_id) = &q.file_id {
        return download_single(&state, file_id).await;
    }

    let record_id = q
        .record_id
        .as_deref()
        .ok_or_else(|| bad_request("recordId or fileId query parameter is required"))?;
    let category = parse_category(q.category.as_deref())?;
    let case = resolve_case(&state, record_id).await?;

    if q.download.as_deref() == Some("zip") {
        download_bundle(&state, &case, category).await
    } else {
        list_attachments(&case, category)
    }
}

async fn resolve_case(state: &AppState, record_id: &str) -> Result<Case, RouteError> {
    state.service.resolve_case(record_id).await.map_err(to_error)
}

async fn download_single(state: &AppState, file_id: &str) -> Result<Response, RouteError> {
    if !is_valid_blob_id(file_id) {
        return Err(bad_request(&format!("malformed file id '{file_id}'")));
    }

    let meta = match state.store.metadata(file_id).await {
        Ok(Some(meta)) => meta,
        Ok(None) => return Err(not_found(&format!("file '{file_id}' not found"))),
        Err(e) => return Err(internal(&format!("metadata lookup: {e}"))),
    };

    let data = match state.store.get(file_id).await {
        Ok(data) => data,
        Err(StoreError::NotFound(_)) => {
            return Err(not_found(&format!("file '{file_id}' not found")))
        }
        Err(e) => return Err(internal(&format!("blob read: {e}"))),
    };

    let content_type = if meta.content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        meta.content_type
    };
    let filename = if meta.filename.is_empty() {
        format!("file-{file_id}")
    } else {
        meta.filename
    };

    Response::builder()
        .header("Content-Type", content_type)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(data))
        .map_err(|e| internal(&format!("response build: {e}")))
}

async fn download_bundle(
    state: &AppState,
    case: &Case,
    category: AttachmentCategory,
) -> Result<Response, RouteError> {
    let entries: Vec<ArchiveEntry> = case
        .attachments_in(category)
        .iter()
        .map(|r| ArchiveEntry {
            file_id: r.file_id.clone(),
            file_name: Some(r.display_name()),
        })
        .collect();

    let output = match build_archive(state.store.clone(), entries).await {
        Ok(output) => output,
        Err(ArchiveError::NoValidFiles) => {
            return Err(not_found(&format!(
                "no valid files to bundle for case '{}' category '{category}'",
                case.id
            )))
        }
        Err(e) => return Err(internal(&e.to_string())),
    };

    Response::builder()
        .header("Content-Type", "application/zip")
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}-{category}.zip\"", case.code),
        )
        .header("X-Files-Successful", output.succeeded.to_string())
        .header("X-Files-Total", output.total.to_string())
        .body(Body::from(output.bytes))
        .map_err(|e| internal(&format!("response build: {e}")))
}

fn list_attachments(case: &Case, category: AttachmentCategory) -> Result<Response, RouteError> {
    let files: Vec<Value> = case
        .attachments_in(category)
        .iter()
        .filter(|r| {
            let ok = is_valid_blob_id(&r.file_id);
            if !ok {
                warn!(case_id = %case.id, file_id = %r.file_id, "skipping malformed blob id in listing");
            }
            ok
        })
        .map(|r| {
            json!({
                "id": r.file_id,
                "name": r.display_name(),
                "downloadUrl": format!("/api/attachments?recordId={}&fileId={}", case.id, r.file_id),
                "size": r.file_size,
                "type": r.file_type,
                "uploadedAt": r.uploaded_at,
                "uploadedBy": r.uploaded_by,
            })
        })
        .collect();

    let body = json!({ "count": files.len(), "files": files });
    Response::builder()
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .map_err(|e| internal(&format!("response build: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    record_id: String,
    file_name: String,
    #[serde(rename = "type")]
    category: Option<String>,
    uploaded_by: Option<String>,
}

/// Accept an upload: blob first, record second. If the record update fails
/// after the blob is written, the blob is orphaned; we log it and move on
/// rather than attempting compensating cleanup.
async fn upload_attachment(
    State(state): State<AppState>,
    Query(q): Query<UploadQuery>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), RouteError> {
    if body.is_empty() {
        return Err(bad_request("upload body must not be empty"));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(bad_request(&format!(
            "file exceeds the {} MB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    let category = parse_category(q.category.as_deref())?;
    let case = resolve_case(&state, &q.record_id).await?;

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let file_size = body.len() as i64;
    let file_id = state
        .store
        .put(&q.file_name, &content_type, body)
        .await
        .map_err(|e| internal(&format!("blob write: {e}")))?;

    let attachment = AttachmentRef {
        file_id: file_id.clone(),
        file_name: q.file_name,
        file_size,
        file_type: content_type,
        uploaded_at: Utc::now(),
        uploaded_by: q.uploaded_by.unwrap_or_default(),
    };

    match state
        .service
        .append_attachment(&case.id, category, &attachment)
        .await
    {
        Ok(_) => Ok((StatusCode::CREATED, Json(json!(attachment)))),
        Err(e) => {
            warn!(%file_id, case_id = %case.id, "record update failed after blob write; blob orphaned");
            Err(to_error(e))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteQuery {
    record_id: String,
    file_id: String,
    #[serde(rename = "type")]
    category: Option<String>,
}

/// Remove an attachment reference, then delete the blob best-effort.
/// Blob deletion failures are logged and swallowed; the reference is
/// already gone and a dangling blob is harmless.
async fn delete_attachment(
    State(state): State<AppState>,
    Query(q): Query<DeleteQuery>,
) -> Result<StatusCode, RouteError> {
    let category = parse_category(q.category.as_deref())?;
    let case = resolve_case(&state, &q.record_id).await?;

    match state
        .service
        .remove_attachment(&case.id, category, &q.file_id)
        .await
    {
        Ok(_) => {}
        Err(ServiceError::NotFound(msg)) => return Err(not_found(&msg)),
        Err(e) => return Err(to_error(e)),
    }

    if let Err(e) = state.store.delete(&q.file_id).await {
        warn!(file_id = %q.file_id, "blob delete failed: {e}");
    }

    Ok(StatusCode::NO_CONTENT)
}
