//! Job repository: lifecycle operations for the `jobs` table.
//!
//! Status transitions are one-directional (pending → in_progress →
//! completed | failed | cancelled) and enforced in SQL with guarded
//! UPDATEs. Progress can only grow, clamped via `MAX(progress, new)`.

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// What a job does. Stored as snake_case text in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ContentGeneration,
    Translation,
    PdfGeneration,
    DocxGeneration,
    ImageProcessing,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ContentGeneration => "content_generation",
            JobKind::Translation => "translation",
            JobKind::PdfGeneration => "pdf_generation",
            JobKind::DocxGeneration => "docx_generation",
            JobKind::ImageProcessing => "image_processing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content_generation" => Some(JobKind::ContentGeneration),
            "translation" => Some(JobKind::Translation),
            "pdf_generation" => Some(JobKind::PdfGeneration),
            "docx_generation" => Some(JobKind::DocxGeneration),
            "image_processing" => Some(JobKind::ImageProcessing),
            _ => None,
        }
    }
}

/// Lifecycle state of a job. `Cancelled` is a terminal state reserved
/// for a future cancellation surface; nothing in the pipeline sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "in_progress" => Some(JobStatus::InProgress),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub project_id: i64,
    pub kind: String,
    pub status: String,
    pub progress: u8,
    pub input: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    /// Builds a fresh pending job with a random UUID.
    pub fn new_pending(kind: JobKind, project_id: i64, input: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id,
            kind: kind.as_str().to_string(),
            status: JobStatus::Pending.as_str().to_string(),
            progress: 0,
            input,
            result: None,
            error: None,
            created_at: Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            kind: row.get("kind")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            input: row.get("input")?,
            result: row.get("result")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, project_id, kind, status, progress, input, result,
             error, created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.project_id,
                job.kind,
                job.status,
                job.progress,
                job.input,
                job.result,
                job.error,
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all jobs of a project, newest first.
pub fn list_for_project(db: &Database, project_id: i64) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE project_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![project_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a pending job to in_progress and stamps `started_at`.
pub fn mark_started(db: &Database, id: &str, started_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET status = 'in_progress', started_at = ?2 \
             WHERE id = ?1 AND status = 'pending'",
            params![id, started_at],
        )?;
        if affected == 0 {
            return Err(transition_rejected(conn, id, JobStatus::InProgress)?);
        }
        Ok(())
    })
}

/// Raises the progress of an in-progress job. Progress is monotonic:
/// a value lower than the stored one leaves the row unchanged.
pub fn update_progress(db: &Database, id: &str, progress: u8) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET progress = MAX(progress, ?2) \
             WHERE id = ?1 AND status = 'in_progress'",
            params![id, progress.min(100)],
        )?;
        if affected == 0 {
            return Err(transition_rejected(conn, id, JobStatus::InProgress)?);
        }
        Ok(())
    })
}

/// Merges the given JSON object into the job's `result` column.
/// Existing keys are overwritten, other keys are preserved.
pub fn merge_result(
    db: &Database,
    id: &str,
    patch: &serde_json::Value,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT result FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, Option<String>>(0))?;
        let current: Option<String> = match rows.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(DatabaseError::Sqlite(e)),
            None => {
                return Err(DatabaseError::NotFound {
                    entity: "job",
                    id: id.to_string(),
                })
            }
        };

        let mut merged: serde_json::Value = current
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_else(|| serde_json::json!({}));
        if let (Some(target), Some(source)) = (merged.as_object_mut(), patch.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }

        conn.execute(
            "UPDATE jobs SET result = ?2 WHERE id = ?1",
            params![id, merged.to_string()],
        )?;
        Ok(())
    })
}

/// Completes an in-progress job: status completed, progress forced to
/// 100 and `completed_at` stamped exactly once.
pub fn mark_completed(db: &Database, id: &str, completed_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET status = 'completed', progress = 100, completed_at = ?2 \
             WHERE id = ?1 AND status = 'in_progress'",
            params![id, completed_at],
        )?;
        if affected == 0 {
            return Err(transition_rejected(conn, id, JobStatus::Completed)?);
        }
        Ok(())
    })
}

/// Fails a job that has not yet reached a terminal state, recording the
/// error message. Progress is left where the failure happened.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    completed_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?2, completed_at = ?3 \
             WHERE id = ?1 AND status IN ('pending', 'in_progress')",
            params![id, error, completed_at],
        )?;
        if affected == 0 {
            return Err(transition_rejected(conn, id, JobStatus::Failed)?);
        }
        Ok(())
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Builds the error for a guarded UPDATE that matched no row: either
/// the job does not exist, or it is not in a state the transition
/// accepts.
fn transition_rejected(
    conn: &Connection,
    id: &str,
    to: JobStatus,
) -> Result<DatabaseError, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status FROM jobs WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
    match rows.next() {
        Some(Ok(from)) => Ok(DatabaseError::InvalidTransition {
            entity: "job",
            id: id.to_string(),
            from,
            to: to.as_str().to_string(),
        }),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(DatabaseError::NotFound {
            entity: "job",
            id: id.to_string(),
        }),
    }
}
