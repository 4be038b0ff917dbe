mod sqlite;

pub use sqlite::SqliteDatabase;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use casetrack_core::api_key::ApiKey;
use casetrack_core::attachment::{AttachmentCategory, AttachmentRef};
use casetrack_core::case::{Case, CaseFilter, CreateCase, UpdateCase};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Configuration for the record store backend.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Path to the SQLite database file. Defaults to
    /// `<data dir>/casetrack.db`.
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            sqlite_path: std::env::var("CASETRACK_DB_PATH").ok(),
        }
    }
}

/// The record store: case documents plus the API-key table.
///
/// Attachment-reference lists are owned by the case record; the store knows
/// nothing about blob contents. `append_attachment` / `remove_attachment`
/// mutate a single category list and bump `updated_at`.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Cases --
    async fn create_case(&self, input: &CreateCase, code: &str) -> Result<Case, DbError>;
    async fn get_case(&self, id: &str) -> Result<Case, DbError>;
    async fn get_case_by_code(&self, code: &str) -> Result<Case, DbError>;
    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, DbError>;
    async fn update_case(&self, id: &str, update: &UpdateCase) -> Result<Case, DbError>;
    async fn delete_case(&self, id: &str) -> Result<(), DbError>;
    async fn count_cases_by_status(&self) -> Result<Vec<(String, i64)>, DbError>;

    // -- Attachment references --
    async fn append_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        attachment: &AttachmentRef,
    ) -> Result<Case, DbError>;
    async fn remove_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        file_id: &str,
    ) -> Result<Case, DbError>;

    // -- API keys --
    async fn insert_api_key(&self, name: &str, key_hash: &str) -> Result<ApiKey, DbError>;
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError>;
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError>;
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError>;
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError>;
    async fn has_api_keys(&self) -> Result<bool, DbError>;
}

/// Default data directory, shared with the local blob store's layout.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("casetrack")
}
