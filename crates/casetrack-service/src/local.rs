use std::sync::Arc;

use async_trait::async_trait;

use casetrack_core::attachment::{AttachmentCategory, AttachmentRef};
use casetrack_core::case::{Case, CaseFilter, CreateCase, UpdateCase};
use casetrack_db::Database;

use crate::{CaseService, ServiceError};

/// Implementation backed directly by the record store.
pub struct LocalService {
    db: Arc<dyn Database>,
}

impl LocalService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

impl From<casetrack_db::DbError> for ServiceError {
    fn from(e: casetrack_db::DbError) -> Self {
        match e {
            casetrack_db::DbError::NotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Human-readable secondary lookup key, e.g. `CASE-4f2a91c3`.
fn new_case_code() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("CASE-{}", &raw[..8])
}

#[async_trait]
impl CaseService for LocalService {
    async fn create_case(&self, input: &CreateCase) -> Result<Case, ServiceError> {
        if input.subject.trim().is_empty() {
            return Err(ServiceError::InvalidInput("subject must not be empty".into()));
        }
        if input.submitted_by.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "submitted_by must not be empty".into(),
            ));
        }
        Ok(self.db.create_case(input, &new_case_code()).await?)
    }

    async fn get_case(&self, id: &str) -> Result<Case, ServiceError> {
        Ok(self.db.get_case(id).await?)
    }

    async fn resolve_case(&self, key: &str) -> Result<Case, ServiceError> {
        match self.db.get_case(key).await {
            Ok(case) => Ok(case),
            Err(casetrack_db::DbError::NotFound(_)) => {
                match self.db.get_case_by_code(key).await {
                    Ok(case) => Ok(case),
                    Err(casetrack_db::DbError::NotFound(_)) => Err(ServiceError::NotFound(
                        format!("case '{key}' (tried id, then code)"),
                    )),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, ServiceError> {
        Ok(self.db.list_cases(filter).await?)
    }

    async fn update_case(&self, id: &str, update: &UpdateCase) -> Result<Case, ServiceError> {
        Ok(self.db.update_case(id, update).await?)
    }

    async fn delete_case(&self, id: &str) -> Result<(), ServiceError> {
        Ok(self.db.delete_case(id).await?)
    }

    async fn count_cases_by_status(&self) -> Result<Vec<(String, i64)>, ServiceError> {
        Ok(self.db.count_cases_by_status().await?)
    }

    async fn append_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        attachment: &AttachmentRef,
    ) -> Result<Case, ServiceError> {
        Ok(self
            .db
            .append_attachment(case_id, category, attachment)
            .await?)
    }

    async fn remove_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        file_id: &str,
    ) -> Result<Case, ServiceError> {
        Ok(self
            .db
            .remove_attachment(case_id, category, file_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casetrack_core::case::Priority;
    use casetrack_db::SqliteDatabase;

    fn service() -> LocalService {
        LocalService::new(Arc::new(SqliteDatabase::open_in_memory().unwrap()))
    }

    fn sample_create() -> CreateCase {
        CreateCase {
            subject: "cannot log in".into(),
            description: String::new(),
            submitted_by: "alice".into(),
            priority: Priority::High,
        }
    }

    #[test]
    fn case_code_format() {
        let code = new_case_code();
        assert!(code.starts_with("CASE-"));
        assert_eq!(code.len(), 13);
        assert!(code[5..].bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn create_assigns_a_code() {
        let svc = service();
        let case = svc.create_case(&sample_create()).await.unwrap();
        assert!(case.code.starts_with("CASE-"));
    }

    #[tokio::test]
    async fn create_rejects_blank_subject() {
        let svc = service();
        let mut input = sample_create();
        input.subject = "   ".into();
        let err = svc.create_case(&input).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn resolve_tries_id_then_code() {
        let svc = service();
        let case = svc.create_case(&sample_create()).await.unwrap();

        let by_id = svc.resolve_case(&case.id).await.unwrap();
        assert_eq!(by_id.id, case.id);

        let by_code = svc.resolve_case(&case.code).await.unwrap();
        assert_eq!(by_code.id, case.id);

        let err = svc.resolve_case("nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(err.to_string().contains("tried id, then code"));
    }
}
