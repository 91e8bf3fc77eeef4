//! Chapter repository: persisted book chapters, ordered by `ordinal`.
//!
//! Ordinals cover the whole book: front matter first, then the
//! introduction, main chapters and conclusion. `(project_id, ordinal)`
//! is unique so a pipeline re-run cannot interleave stale rows.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw chapter row from the database.
#[derive(Debug, Clone)]
pub struct ChapterRow {
    pub id: i64,
    pub project_id: i64,
    pub ordinal: u32,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

impl ChapterRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            ordinal: row.get("ordinal")?,
            title: row.get("title")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a chapter and returns its row id.
pub fn insert(
    db: &Database,
    project_id: i64,
    ordinal: u32,
    title: &str,
    content: &str,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO chapters (project_id, ordinal, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![project_id, ordinal, title, content, created_at],
        );
        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DatabaseError::Conflict {
                    entity: "chapter",
                    detail: msg.unwrap_or_else(|| {
                        format!("duplicate ordinal {} for project {}", ordinal, project_id)
                    }),
                })
            }
            Err(e) => Err(e.into()),
        }
    })
}

/// Lists all chapters of a project in reading order.
pub fn list_for_project(db: &Database, project_id: i64) -> Result<Vec<ChapterRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM chapters WHERE project_id = ?1 ORDER BY ordinal")?;
        let rows: Vec<ChapterRow> = stmt
            .query_map(params![project_id], ChapterRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts the chapters of a project.
pub fn count_for_project(db: &Database, project_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM chapters WHERE project_id = ?1",
            params![project_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Deletes all chapters of a project. Returns how many rows went away.
pub fn delete_for_project(db: &Database, project_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM chapters WHERE project_id = ?1",
            params![project_id],
        )?;
        Ok(deleted as u64)
    })
}
