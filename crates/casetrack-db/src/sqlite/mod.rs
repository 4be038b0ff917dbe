pub(crate) mod migrations;
pub(crate) mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use casetrack_core::api_key::ApiKey;
use casetrack_core::attachment::{AttachmentCategory, AttachmentRef};
use casetrack_core::case::{Case, CaseFilter, CreateCase, UpdateCase};

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into
/// `Result<T, DbError>`. Calling `.to_db()?` is the shortest way to do the
/// mapping inside the query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("casetrack.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).map_err(map_sqlite_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .map_err(map_sqlite_err)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_err)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(map_sqlite_err)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            migrations::run(conn)?;
            Ok(())
        })
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_case(&self, input: &CreateCase, code: &str) -> Result<Case, DbError> {
        let db = self.clone();
        let input = input.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || db.create_case_sync(&input, &code))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn get_case(&self, id: &str) -> Result<Case, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.get_case_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn get_case_by_code(&self, code: &str) -> Result<Case, DbError> {
        let db = self.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || db.get_case_by_code_sync(&code))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, DbError> {
        let db = self.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || db.list_cases_sync(&filter))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn update_case(&self, id: &str, update: &UpdateCase) -> Result<Case, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let update = update.clone();
        tokio::task::spawn_blocking(move || db.update_case_sync(&id, &update))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn delete_case(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_case_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn count_cases_by_status(&self) -> Result<Vec<(String, i64)>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.count_cases_by_status_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn append_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        attachment: &AttachmentRef,
    ) -> Result<Case, DbError> {
        let db = self.clone();
        let case_id = case_id.to_string();
        let attachment = attachment.clone();
        tokio::task::spawn_blocking(move || {
            db.append_attachment_sync(&case_id, category, &attachment)
        })
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn remove_attachment(
        &self,
        case_id: &str,
        category: AttachmentCategory,
        file_id: &str,
    ) -> Result<Case, DbError> {
        let db = self.clone();
        let case_id = case_id.to_string();
        let file_id = file_id.to_string();
        tokio::task::spawn_blocking(move || {
            db.remove_attachment_sync(&case_id, category, &file_id)
        })
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn insert_api_key(&self, name: &str, key_hash: &str) -> Result<ApiKey, DbError> {
        let db = self.clone();
        let name = name.to_string();
        let key_hash = key_hash.to_string();
        tokio::task::spawn_blocking(move || db.insert_api_key_sync(&name, &key_hash))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.list_api_keys_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        let db = self.clone();
        let key_hash = key_hash.to_string();
        tokio::task::spawn_blocking(move || db.find_api_key_by_hash_sync(&key_hash))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.touch_api_key_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_api_key_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn has_api_keys(&self) -> Result<bool, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.has_api_keys_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_returns_working_db() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
                .map_err(|e| DbError::Internal(e.to_string()))?;
            assert!(count > 0); // migrations created tables
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_path_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("test.db");
        assert!(!db_path.exists());

        let _db = SqliteDatabase::open_path(&db_path).unwrap();
        assert!(db_path.exists());
    }
}
