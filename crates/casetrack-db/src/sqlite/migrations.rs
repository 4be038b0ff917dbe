use rusqlite::Connection;

use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    // Idempotent schema — CREATE TABLE IF NOT EXISTS throughout.
    //
    // Attachment-reference lists are JSON arrays in TEXT columns; the record
    // is document-shaped and the lists are always read or written whole.
    // `complaint_attachments` is the legacy name for the submission list and
    // is kept so old records keep their files.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cases (
            id                      TEXT PRIMARY KEY,
            code                    TEXT NOT NULL UNIQUE,
            subject                 TEXT NOT NULL,
            description             TEXT NOT NULL DEFAULT '',
            status                  TEXT NOT NULL DEFAULT 'open'
                                        CHECK(status IN (
                                            'open', 'assigned', 'in_progress',
                                            'completed', 'rejected', 'closed'
                                        )),
            priority                TEXT NOT NULL DEFAULT 'medium'
                                        CHECK(priority IN ('urgent', 'high', 'medium', 'low', 'none')),
            submitted_by            TEXT NOT NULL,
            assigned_to             TEXT,
            attachments             TEXT NOT NULL DEFAULT '[]',
            complaint_attachments   TEXT NOT NULL DEFAULT '[]',
            assignment_attachments  TEXT NOT NULL DEFAULT '[]',
            completion_attachments  TEXT NOT NULL DEFAULT '[]',
            rejection_attachments   TEXT NOT NULL DEFAULT '[]',
            developer_attachments   TEXT NOT NULL DEFAULT '[]',
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cases_status   ON cases(status);
        CREATE INDEX IF NOT EXISTS idx_cases_assigned ON cases(assigned_to);

        CREATE TABLE IF NOT EXISTS api_keys (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL DEFAULT '',
            key_hash     TEXT NOT NULL UNIQUE,
            created_at   TEXT NOT NULL,
            last_used_at TEXT
        );
        ",
    )
    .map_err(super::map_sqlite_err)?;
    Ok(())
}
