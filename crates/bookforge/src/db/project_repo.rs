//! Project repository: CRUD operations for the `projects` table.

use chrono::Utc;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// Lifecycle state of a book project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    GeneratingContent,
    Completed,
    Failed,
    Translating,
    Translated,
    RenderingDocuments,
    DocumentsReady,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::GeneratingContent => "generating_content",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Translating => "translating",
            ProjectStatus::Translated => "translated",
            ProjectStatus::RenderingDocuments => "rendering_documents",
            ProjectStatus::DocumentsReady => "documents_ready",
        }
    }
}

/// A raw project row from the database.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub description: Option<String>,
    pub number_of_chapters: u32,
    pub base_language: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            subtitle: row.get("subtitle")?,
            author: row.get("author")?,
            description: row.get("description")?,
            number_of_chapters: row.get("number_of_chapters")?,
            base_language: row.get("base_language")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields for a new project. Status starts at `draft`.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub description: Option<String>,
    pub number_of_chapters: u32,
    pub base_language: String,
}

/// Book metadata replaced in one write when a generation request is
/// accepted.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub description: Option<String>,
    pub number_of_chapters: u32,
}

/// Inserts a new project and returns its row id.
pub fn insert(db: &Database, project: &NewProject) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO projects (title, subtitle, author, description, number_of_chapters,
             base_language, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'draft', ?7, ?7)",
            params![
                project.title,
                project.subtitle,
                project.author,
                project.description,
                project.number_of_chapters,
                project.base_language,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a project by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<ProjectRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM projects WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ProjectRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Replaces the book metadata on a project. Returns `false` if the
/// project no longer exists.
pub fn update_metadata(
    db: &Database,
    id: i64,
    meta: &ProjectMetadata,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE projects SET title = ?2, subtitle = ?3, author = ?4, description = ?5,
             number_of_chapters = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                meta.title,
                meta.subtitle,
                meta.author,
                meta.description,
                meta.number_of_chapters,
                updated_at,
            ],
        )?;
        Ok(affected > 0)
    })
}

/// Updates the project status. Returns `false` if the project no
/// longer exists. Callers that run after a delete treat this as
/// best-effort and log rather than fail.
pub fn update_status(
    db: &Database,
    id: i64,
    status: ProjectStatus,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE projects SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), updated_at],
        )?;
        Ok(affected > 0)
    })
}
