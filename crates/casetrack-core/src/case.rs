use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::{AttachmentCategory, AttachmentRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Rejected,
    Closed,
}

impl CaseStatus {
    pub const ALL: &[CaseStatus] = &[
        CaseStatus::Open,
        CaseStatus::Assigned,
        CaseStatus::InProgress,
        CaseStatus::Completed,
        CaseStatus::Rejected,
        CaseStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Assigned => "assigned",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::Completed => "completed",
            CaseStatus::Rejected => "rejected",
            CaseStatus::Closed => "closed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CaseStatus::Open => "Open",
            CaseStatus::Assigned => "Assigned",
            CaseStatus::InProgress => "In Progress",
            CaseStatus::Completed => "Completed",
            CaseStatus::Rejected => "Rejected",
            CaseStatus::Closed => "Closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(CaseStatus::Open),
            "assigned" => Some(CaseStatus::Assigned),
            "in_progress" => Some(CaseStatus::InProgress),
            "completed" => Some(CaseStatus::Completed),
            "rejected" => Some(CaseStatus::Rejected),
            "closed" => Some(CaseStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "urgent" => Some(Priority::Urgent),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            "none" => Some(Priority::None),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complaint/task record.
///
/// Carries one attachment-reference list per category. The submission list
/// has two fields because the schema evolved: new records populate
/// `attachments`, old ones only `complaint_attachments`. All reads go through
/// [`Case::attachments_in`] so the fallback lives in exactly one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    /// Secondary human-readable lookup key, e.g. `CASE-4f2a91c3`.
    pub code: String,
    pub subject: String,
    pub description: String,
    pub status: CaseStatus,
    pub priority: Priority,
    pub submitted_by: String,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Legacy name for the submission list; read only when `attachments`
    /// is empty.
    #[serde(default)]
    pub complaint_attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub assignment_attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub completion_attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub rejection_attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub developer_attachments: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// The attachment list for a category, applying the legacy
    /// `complaint_attachments` fallback for the submission category.
    pub fn attachments_in(&self, category: AttachmentCategory) -> &[AttachmentRef] {
        match category {
            AttachmentCategory::Submission => {
                if self.attachments.is_empty() {
                    &self.complaint_attachments
                } else {
                    &self.attachments
                }
            }
            AttachmentCategory::Assignment => &self.assignment_attachments,
            AttachmentCategory::Completion => &self.completion_attachments,
            AttachmentCategory::Rejection => &self.rejection_attachments,
            AttachmentCategory::Developer => &self.developer_attachments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCase {
    pub subject: String,
    #[serde(default)]
    pub description: String,
    pub submitted_by: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCase {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<CaseStatus>,
    pub priority: Option<Priority>,
    /// Absent means leave unchanged; an explicit JSON null clears the
    /// assignment.
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
}

/// Distinguish a missing field from an explicit null: a present value
/// (including null) becomes `Some(..)`, absence stays `None` via the
/// field's default.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub submitted_by: Option<String>,
    pub assigned_to: Option<String>,
    pub limit: Option<i64>,
}
