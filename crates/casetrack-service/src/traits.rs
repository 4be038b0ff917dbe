use async_trait::async_trait;
use thiserror::Error;

use casetrack_core::attachment::{AttachmentCategory, AttachmentRef};
use casetrack_core::case::{Case, CaseFilter, CreateCase, UpdateCase};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Abstraction over case-tracking operations.
///
/// The HTTP routes program against this trait; `LocalService` wraps the
/// record store directly.
#[async_trait]
pub trait CaseService: Send + Sync {
    /// Create a case, validating input and assigning the human-readable code.
    async fn create_case(&self, input: &CreateCase) -> Result<Case, ServiceError>;

    async fn get_case(&self, id: &str) -> Result<Case, ServiceError>;

    /// Look up a case by primary id, falling back to the `code` field.
    async fn resolve_case(&self, key: &str) -> Result<Case, ServiceError>;

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, ServiceError>;
    async fn update_case(&self, id: &str, update: &UpdateCase) -> Result<Case, ServiceError>;
    async fn delete_case(&self, id: &str) -> Result<(), ServiceError>;
    async fn count_cases_by_status(&self) -> Result<Vec<(String, i64)>, ServiceError>;

    async fn append_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        attachment: &AttachmentRef,
    ) -> Result<Case, ServiceError>;
    async fn remove_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        file_id: &str,
    ) -> Result<Case, ServiceError>;
}
