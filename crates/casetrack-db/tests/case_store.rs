//! Exercises the async `Database` trait surface against in-memory SQLite,
//! the same way the server consumes it (through `Arc<dyn Database>`).

use std::sync::Arc;

use chrono::Utc;

use casetrack_core::attachment::{AttachmentCategory, AttachmentRef};
use casetrack_core::case::{CaseFilter, CaseStatus, CreateCase, Priority, UpdateCase};
use casetrack_db::{Database, SqliteDatabase};

fn db() -> Arc<dyn Database> {
    Arc::new(SqliteDatabase::open_in_memory().unwrap())
}

fn sample_create(subject: &str) -> CreateCase {
    CreateCase {
        subject: subject.into(),
        description: String::new(),
        submitted_by: "alice".into(),
        priority: Priority::Medium,
    }
}

fn sample_ref(id: &str) -> AttachmentRef {
    AttachmentRef {
        file_id: id.into(),
        file_name: "file.txt".into(),
        file_size: 1,
        file_type: "text/plain".into(),
        uploaded_at: Utc::now(),
        uploaded_by: "alice".into(),
    }
}

#[tokio::test]
async fn case_lifecycle_through_trait() {
    let db = db();

    let case = db
        .create_case(&sample_create("broken login"), "CASE-11111111")
        .await
        .unwrap();
    assert_eq!(case.status, CaseStatus::Open);

    let fetched = db.get_case(&case.id).await.unwrap();
    assert_eq!(fetched.code, "CASE-11111111");

    let by_code = db.get_case_by_code("CASE-11111111").await.unwrap();
    assert_eq!(by_code.id, case.id);

    let updated = db
        .update_case(
            &case.id,
            &UpdateCase {
                status: Some(CaseStatus::InProgress),
                assigned_to: Some(Some("dev-1".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, CaseStatus::InProgress);

    db.delete_case(&case.id).await.unwrap();
    assert!(db.get_case(&case.id).await.is_err());
}

#[tokio::test]
async fn attachment_references_through_trait() {
    let db = db();
    let case = db
        .create_case(&sample_create("attachment case"), "CASE-22222222")
        .await
        .unwrap();

    let case = db
        .append_attachment(
            &case.id,
            AttachmentCategory::Completion,
            &sample_ref("a1a1a1a1a1a1a1a1a1a1a1a1"),
        )
        .await
        .unwrap();
    assert_eq!(case.completion_attachments.len(), 1);

    let case = db
        .remove_attachment(
            &case.id,
            AttachmentCategory::Completion,
            "a1a1a1a1a1a1a1a1a1a1a1a1",
        )
        .await
        .unwrap();
    assert!(case.completion_attachments.is_empty());
}

#[tokio::test]
async fn list_cases_respects_limit() {
    let db = db();
    for i in 0..5 {
        db.create_case(&sample_create("case"), &format!("CASE-{i}"))
            .await
            .unwrap();
    }
    let limited = db
        .list_cases(&CaseFilter {
            limit: Some(3),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 3);
}

#[tokio::test]
async fn concurrent_appends_do_not_lose_references() {
    let db = db();
    let case = db
        .create_case(&sample_create("contended"), "CASE-33333333")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        let case_id = case.id.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("{i}{}", "a".repeat(23));
            db.append_attachment(&case_id, AttachmentCategory::Submission, &sample_ref(&id))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let case = db.get_case(&case.id).await.unwrap();
    assert_eq!(case.attachments.len(), 8);
}
