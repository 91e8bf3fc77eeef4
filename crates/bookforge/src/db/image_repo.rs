//! Image repository: uploaded illustrations attached to a project.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw project image row from the database. `path` points at the
/// stored file on disk; `position` orders the plates in the book.
#[derive(Debug, Clone)]
pub struct ImageRow {
    pub id: i64,
    pub project_id: i64,
    pub filename: String,
    pub path: String,
    pub position: u32,
}

impl ImageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            filename: row.get("filename")?,
            path: row.get("path")?,
            position: row.get("position")?,
        })
    }
}

/// Inserts an image reference and returns its row id.
pub fn insert(
    db: &Database,
    project_id: i64,
    filename: &str,
    path: &str,
    position: u32,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO project_images (project_id, filename, path, position)
             VALUES (?1, ?2, ?3, ?4)",
            params![project_id, filename, path, position],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Lists the images of a project in plate order.
pub fn list_for_project(db: &Database, project_id: i64) -> Result<Vec<ImageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM project_images WHERE project_id = ?1 ORDER BY position, id")?;
        let rows: Vec<ImageRow> = stmt
            .query_map(params![project_id], ImageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
