//! Render queue repository: a durable task queue for document jobs.
//!
//! Tasks survive restarts because they live in SQLite. Claiming is a
//! two-step select-then-guarded-update so that a task is handed to at
//! most one worker even when several processes poll the same file.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw render queue row from the database.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub project_id: i64,
    pub payload: String,
    pub status: String,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            payload: row.get("payload")?,
            status: row.get("status")?,
            error: row.get("error")?,
            attempts: row.get("attempts")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

/// Enqueues a task payload and returns the generated task id.
pub fn enqueue(
    db: &Database,
    project_id: i64,
    payload: &str,
    created_at: &str,
) -> Result<String, DatabaseError> {
    let id = uuid::Uuid::new_v4().to_string();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO render_queue (id, project_id, payload, status, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![id, project_id, payload, created_at],
        )?;
        Ok(())
    })?;
    Ok(id)
}

/// Claims the oldest pending task, moving it to `processing` and
/// bumping its attempt counter. Returns `None` when the queue is empty
/// or another worker won the claim.
pub fn claim_next(db: &Database, started_at: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id FROM render_queue WHERE status = 'pending'
             ORDER BY created_at, id LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let id: String = match rows.next() {
            Some(Ok(id)) => id,
            Some(Err(e)) => return Err(DatabaseError::Sqlite(e)),
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        let claimed = conn.execute(
            "UPDATE render_queue SET status = 'processing', started_at = ?2,
             attempts = attempts + 1
             WHERE id = ?1 AND status = 'pending'",
            params![id, started_at],
        )?;
        if claimed == 0 {
            // Lost the claim to a concurrent worker.
            return Ok(None);
        }

        let mut stmt = conn.prepare("SELECT * FROM render_queue WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TaskRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Marks a processing task as completed.
pub fn complete(db: &Database, id: &str, finished_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE render_queue SET status = 'completed', finished_at = ?2
             WHERE id = ?1 AND status = 'processing'",
            params![id, finished_at],
        )?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "render task",
                id: id.to_string(),
            });
        }
        Ok(())
    })
}

/// Marks a processing task as failed with an error message.
pub fn fail(db: &Database, id: &str, error: &str, finished_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE render_queue SET status = 'failed', error = ?2, finished_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error, finished_at],
        )?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "render task",
                id: id.to_string(),
            });
        }
        Ok(())
    })
}

/// Finds a task by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM render_queue WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TaskRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts tasks with the given status string.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM render_queue WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
