// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document metadata backed by SQLite.
//
// Only the record lives here; the bytes are in a `ByteStore`, referenced by
// `stored_key`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::{DocumentId, DocumentRecord};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        original_filename TEXT NOT NULL,
        stored_key TEXT NOT NULL,
        content_type TEXT NOT NULL,
        uploaded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS documents_stored_key ON documents (stored_key);
"#;

const SELECT_COLUMNS: &str = "SELECT id, original_filename, stored_key, content_type, uploaded_at FROM documents";

/// Records keyed by [`DocumentId`].
pub trait MetadataStore: Send + Sync {
    fn insert(&self, record: &DocumentRecord) -> Result<()>;

    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<DocumentRecord>>;

    /// Remove a record; returns whether it existed.
    fn delete(&self, id: &DocumentId) -> Result<bool>;

    /// How many records point at `stored_key`.
    fn count_by_key(&self, stored_key: &str) -> Result<u64>;
}

/// [`MetadataStore`] on a single SQLite connection.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it sits behind a
/// mutex; every query is short.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| DocuAlignError::Database(format!("open: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DocuAlignError::Database(format!("WAL pragma: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| DocuAlignError::Database(format!("create table: {e}")))?;

        info!("metadata database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocuAlignError::Database(format!("open in-memory: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| DocuAlignError::Database(format!("create table: {e}")))?;

        debug!("in-memory metadata database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataStore for SqliteMetadataStore {
    #[instrument(skip_all, fields(id = %record.id))]
    fn insert(&self, record: &DocumentRecord) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO documents (id, original_filename, stored_key, content_type, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.to_string(),
                    record.original_filename,
                    record.stored_key,
                    record.content_type,
                    record.uploaded_at.to_rfc3339(),
                ],
            )
            .map_err(|e| DocuAlignError::Database(format!("insert document: {e}")))?;

        debug!("document record inserted");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        self.conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                row_to_record,
            )
            .optional()
            .map_err(|e| DocuAlignError::Database(format!("get document: {e}")))
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY uploaded_at DESC"))
            .map_err(|e| DocuAlignError::Database(format!("prepare list: {e}")))?;
        let records = stmt
            .query_map([], row_to_record)
            .map_err(|e| DocuAlignError::Database(format!("query list: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DocuAlignError::Database(format!("collect rows: {e}")))?;

        debug!(count = records.len(), "listed documents");
        Ok(records)
    }

    #[instrument(skip(self), fields(id = %id))]
    fn delete(&self, id: &DocumentId) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])
            .map_err(|e| DocuAlignError::Database(format!("delete document: {e}")))?;
        Ok(rows > 0)
    }

    fn count_by_key(&self, stored_key: &str) -> Result<u64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE stored_key = ?1",
                params![stored_key],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count as u64)
            .map_err(|e| DocuAlignError::Database(format!("count by key: {e}")))
    }
}

/// Column order must match [`SELECT_COLUMNS`].
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let id_str: String = row.get(0)?;
    let uploaded_at_str: String = row.get(4)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let uploaded_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&uploaded_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(DocumentRecord {
        id: DocumentId(id),
        original_filename: row.get(1)?,
        stored_key: row.get(2)?,
        content_type: row.get(3)?,
        uploaded_at,
    })
}
