use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to a stored blob, owned by the parent case record.
///
/// Created when an upload is accepted and never mutated afterwards. The
/// referenced blob may have been deleted out from under us; dangling
/// references are treated as not-found, never as a fatal condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub uploaded_by: String,
}

impl AttachmentRef {
    /// Display name for the file, falling back to `file-<id>` when the
    /// stored name is empty.
    pub fn display_name(&self) -> String {
        if self.file_name.is_empty() {
            format!("file-{}", self.file_id)
        } else {
            self.file_name.clone()
        }
    }
}

/// Blob identifiers are 24-character lowercase hex strings assigned by the
/// store at write time. Anything else is malformed and gets filtered out of
/// listings and bundles rather than failing the request.
pub fn is_valid_blob_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// The purpose a given attachment list serves on a case record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCategory {
    /// The customer's original submission. Primary field `attachments`,
    /// with a legacy `complaint_attachments` fallback.
    Submission,
    Assignment,
    Completion,
    Rejection,
    Developer,
}

impl AttachmentCategory {
    pub const ALL: &[AttachmentCategory] = &[
        AttachmentCategory::Submission,
        AttachmentCategory::Assignment,
        AttachmentCategory::Completion,
        AttachmentCategory::Rejection,
        AttachmentCategory::Developer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentCategory::Submission => "submission",
            AttachmentCategory::Assignment => "assignment",
            AttachmentCategory::Completion => "completion",
            AttachmentCategory::Rejection => "rejection",
            AttachmentCategory::Developer => "developer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submission" => Some(AttachmentCategory::Submission),
            "assignment" => Some(AttachmentCategory::Assignment),
            "completion" => Some(AttachmentCategory::Completion),
            "rejection" => Some(AttachmentCategory::Rejection),
            "developer" => Some(AttachmentCategory::Developer),
            _ => None,
        }
    }
}

impl fmt::Display for AttachmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
