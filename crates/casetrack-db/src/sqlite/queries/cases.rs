use chrono::Utc;
use rusqlite::{params, Row};

use casetrack_core::attachment::{AttachmentCategory, AttachmentRef};
use casetrack_core::case::{Case, CaseFilter, CaseStatus, CreateCase, Priority, UpdateCase};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn parse_refs(raw: String) -> rusqlite::Result<Vec<AttachmentRef>> {
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_case(row: &Row) -> rusqlite::Result<Case> {
    let status_str: String = row.get("status")?;
    let priority_str: String = row.get("priority")?;
    Ok(Case {
        id: row.get("id")?,
        code: row.get("code")?,
        subject: row.get("subject")?,
        description: row.get("description")?,
        status: CaseStatus::from_str(&status_str).unwrap_or(CaseStatus::Open),
        priority: Priority::from_str(&priority_str).unwrap_or(Priority::Medium),
        submitted_by: row.get("submitted_by")?,
        assigned_to: row.get("assigned_to")?,
        attachments: parse_refs(row.get("attachments")?)?,
        complaint_attachments: parse_refs(row.get("complaint_attachments")?)?,
        assignment_attachments: parse_refs(row.get("assignment_attachments")?)?,
        completion_attachments: parse_refs(row.get("completion_attachments")?)?,
        rejection_attachments: parse_refs(row.get("rejection_attachments")?)?,
        developer_attachments: parse_refs(row.get("developer_attachments")?)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// The column new writes for a category land in. The submission category
/// writes to the primary `attachments` column; `complaint_attachments` only
/// ever holds data written by the pre-rename schema.
fn category_column(category: AttachmentCategory) -> &'static str {
    match category {
        AttachmentCategory::Submission => "attachments",
        AttachmentCategory::Assignment => "assignment_attachments",
        AttachmentCategory::Completion => "completion_attachments",
        AttachmentCategory::Rejection => "rejection_attachments",
        AttachmentCategory::Developer => "developer_attachments",
    }
}

fn encode_refs(refs: &[AttachmentRef]) -> Result<String, DbError> {
    serde_json::to_string(refs).map_err(|e| DbError::Internal(format!("encode attachments: {e}")))
}

fn not_found_case(e: rusqlite::Error, what: String) -> DbError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what),
        other => DbError::Internal(other.to_string()),
    }
}

impl SqliteDatabase {
    pub fn create_case_sync(&self, input: &CreateCase, code: &str) -> Result<Case, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO cases (id, code, subject, description, priority, submitted_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    code,
                    input.subject,
                    input.description,
                    input.priority.as_str(),
                    input.submitted_by,
                    now,
                    now
                ],
            )
            .to_db()?;
            conn.query_row("SELECT * FROM cases WHERE id = ?1", params![id], row_to_case)
                .to_db()
        })
    }

    pub fn get_case_sync(&self, id: &str) -> Result<Case, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM cases WHERE id = ?1", params![id], row_to_case)
                .map_err(|e| not_found_case(e, format!("case {id}")))
        })
    }

    pub fn get_case_by_code_sync(&self, code: &str) -> Result<Case, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM cases WHERE code = ?1",
                params![code],
                row_to_case,
            )
            .map_err(|e| not_found_case(e, format!("case with code '{code}'")))
        })
    }

    pub fn list_cases_sync(&self, filter: &CaseFilter) -> Result<Vec<Case>, DbError> {
        self.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(status) = filter.status {
                clauses.push("status = ?");
                values.push(Box::new(status.as_str().to_string()));
            }
            if let Some(ref submitted_by) = filter.submitted_by {
                clauses.push("submitted_by = ?");
                values.push(Box::new(submitted_by.clone()));
            }
            if let Some(ref assigned_to) = filter.assigned_to {
                clauses.push("assigned_to = ?");
                values.push(Box::new(assigned_to.clone()));
            }

            let mut sql = String::from("SELECT * FROM cases");
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY created_at DESC");
            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }

            let mut stmt = conn.prepare(&sql).to_db()?;
            let cases = stmt
                .query_map(rusqlite::params_from_iter(values.iter()), row_to_case)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(cases)
        })
    }

    pub fn update_case_sync(&self, id: &str, update: &UpdateCase) -> Result<Case, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref subject) = update.subject {
                sets.push("subject = ?");
                values.push(Box::new(subject.clone()));
            }
            if let Some(ref description) = update.description {
                sets.push("description = ?");
                values.push(Box::new(description.clone()));
            }
            if let Some(status) = update.status {
                sets.push("status = ?");
                values.push(Box::new(status.as_str().to_string()));
            }
            if let Some(priority) = update.priority {
                sets.push("priority = ?");
                values.push(Box::new(priority.as_str().to_string()));
            }
            if let Some(ref assigned_to) = update.assigned_to {
                sets.push("assigned_to = ?");
                values.push(Box::new(assigned_to.clone()));
            }

            sets.push("updated_at = ?");
            values.push(Box::new(Utc::now()));

            let sql = format!(
                "UPDATE cases SET {} WHERE id = ?{}",
                sets.join(", "),
                values.len() + 1
            );
            values.push(Box::new(id.to_string()));

            let changed = conn
                .execute(&sql, rusqlite::params_from_iter(values.iter()))
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("case {id}")));
            }
            conn.query_row("SELECT * FROM cases WHERE id = ?1", params![id], row_to_case)
                .to_db()
        })
    }

    pub fn delete_case_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM cases WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("case {id}")));
            }
            Ok(())
        })
    }

    pub fn count_cases_by_status_sync(&self) -> Result<Vec<(String, i64)>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT status, count(*) FROM cases GROUP BY status")
                .to_db()?;
            let counts = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(counts)
        })
    }

    pub fn append_attachment_sync(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        attachment: &AttachmentRef,
    ) -> Result<Case, DbError> {
        let column = category_column(category);
        self.with_conn(|conn| {
            let raw: String = conn
                .query_row(
                    &format!("SELECT {column} FROM cases WHERE id = ?1"),
                    params![case_id],
                    |row| row.get(0),
                )
                .map_err(|e| not_found_case(e, format!("case {case_id}")))?;
            let mut refs: Vec<AttachmentRef> = serde_json::from_str(&raw)
                .map_err(|e| DbError::Internal(format!("decode attachments: {e}")))?;
            refs.push(attachment.clone());

            conn.execute(
                &format!("UPDATE cases SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![encode_refs(&refs)?, Utc::now(), case_id],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM cases WHERE id = ?1",
                params![case_id],
                row_to_case,
            )
            .to_db()
        })
    }

    pub fn remove_attachment_sync(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        file_id: &str,
    ) -> Result<Case, DbError> {
        // The submission category spans two columns (current + legacy), so
        // the reference is removed wherever it appears.
        let columns: Vec<&str> = match category {
            AttachmentCategory::Submission => vec!["attachments", "complaint_attachments"],
            other => vec![category_column(other)],
        };
        self.with_conn(|conn| {
            let mut removed = false;
            for column in columns {
                let raw: String = conn
                    .query_row(
                        &format!("SELECT {column} FROM cases WHERE id = ?1"),
                        params![case_id],
                        |row| row.get(0),
                    )
                    .map_err(|e| not_found_case(e, format!("case {case_id}")))?;
                let mut refs: Vec<AttachmentRef> = serde_json::from_str(&raw)
                    .map_err(|e| DbError::Internal(format!("decode attachments: {e}")))?;
                let before = refs.len();
                refs.retain(|r| r.file_id != file_id);
                if refs.len() != before {
                    removed = true;
                    conn.execute(
                        &format!("UPDATE cases SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                        params![encode_refs(&refs)?, Utc::now(), case_id],
                    )
                    .to_db()?;
                }
            }
            if !removed {
                return Err(DbError::NotFound(format!(
                    "attachment {file_id} on case {case_id}"
                )));
            }
            conn.query_row(
                "SELECT * FROM cases WHERE id = ?1",
                params![case_id],
                row_to_case,
            )
            .to_db()
        })
    }
}
