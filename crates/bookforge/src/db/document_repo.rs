//! Document repository: rendered artifacts for download.
//!
//! One row per `(project_id, doc_type, language)`, enforced by a
//! unique constraint. Re-rendering the same combination is a conflict,
//! not an overwrite.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};
use crate::render::DocumentType;

/// Lifecycle state of a rendered document. The worker only writes
/// `completed` rows; the other states exist for the CRUD surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Generating => "generating",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// A raw document row from the database.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub project_id: i64,
    pub doc_type: String,
    pub language: String,
    pub filename: String,
    pub url: String,
    pub public_id: String,
    pub size_bytes: i64,
    pub status: String,
    pub created_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            doc_type: row.get("doc_type")?,
            language: row.get("language")?,
            filename: row.get("filename")?,
            url: row.get("url")?,
            public_id: row.get("public_id")?,
            size_bytes: row.get("size_bytes")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields for a new document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub project_id: i64,
    pub doc_type: DocumentType,
    pub language: String,
    pub filename: String,
    pub url: String,
    pub public_id: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
}

/// Inserts a document row and returns its id. A second document with
/// the same `(project_id, doc_type, language)` is rejected as a
/// conflict.
pub fn insert(db: &Database, doc: &NewDocument, created_at: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO documents (project_id, doc_type, language, filename, url,
             public_id, size_bytes, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                doc.project_id,
                doc.doc_type.as_str(),
                doc.language,
                doc.filename,
                doc.url,
                doc.public_id,
                doc.size_bytes,
                doc.status.as_str(),
                created_at,
            ],
        );
        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DatabaseError::Conflict {
                    entity: "document",
                    detail: msg.unwrap_or_else(|| {
                        format!(
                            "document already exists for project {} ({}, {})",
                            doc.project_id,
                            doc.doc_type.as_str(),
                            doc.language
                        )
                    }),
                })
            }
            Err(e) => Err(e.into()),
        }
    })
}

/// Finds the document for an exact `(project, type, language)` triple.
pub fn find_for_project(
    db: &Database,
    project_id: i64,
    doc_type: DocumentType,
    language: &str,
) -> Result<Option<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM documents WHERE project_id = ?1 AND doc_type = ?2 AND language = ?3",
        )?;
        let mut rows = stmt.query_map(
            params![project_id, doc_type.as_str(), language],
            DocumentRow::from_row,
        )?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all completed documents of a project, newest first.
pub fn list_completed_for_project(
    db: &Database,
    project_id: i64,
) -> Result<Vec<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM documents WHERE project_id = ?1 AND status = 'completed'
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows: Vec<DocumentRow> = stmt
            .query_map(params![project_id], DocumentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
