//! Read-side queries: job status and download links.

use serde::Serialize;

use crate::db::{document_repo, job_repo, Database};
use crate::error::ServiceError;

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub job_id: String,
    pub project_id: i64,
    pub kind: String,
    pub status: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// A completed document available for download.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub document_id: i64,
    pub doc_type: String,
    pub language: String,
    pub filename: String,
    pub url: String,
    pub size_bytes: i64,
}

/// Read-only status and download queries.
pub struct StatusService {
    db: Database,
}

impl StatusService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Looks up a job by id.
    pub fn generation_status(&self, job_id: &str) -> Result<GenerationStatus, ServiceError> {
        let job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| ServiceError::JobNotFound(job_id.to_string()))?;

        // The result column holds JSON; fall back to the raw text if an
        // old row predates that convention.
        let result = job.result.as_deref().map(|raw| {
            serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
        });

        Ok(GenerationStatus {
            job_id: job.id,
            project_id: job.project_id,
            kind: job.kind,
            status: job.status,
            progress: job.progress,
            result,
            error: job.error,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
    }

    /// Lists the completed documents of a project, newest first.
    pub fn download_links(&self, project_id: i64) -> Result<Vec<DownloadLink>, ServiceError> {
        let documents = document_repo::list_completed_for_project(&self.db, project_id)?;
        Ok(documents
            .into_iter()
            .map(|doc| DownloadLink {
                document_id: doc.id,
                doc_type: doc.doc_type,
                language: doc.language,
                filename: doc.filename,
                url: doc.url,
                size_bytes: doc.size_bytes,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::document_repo::{DocumentStatus, NewDocument};
    use crate::db::job_repo::{JobKind, JobRow};
    use crate::db::project_repo::{self, NewProject};
    use crate::render::DocumentType;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn insert_project(db: &Database) -> i64 {
        project_repo::insert(
            db,
            &NewProject {
                title: "Test Book".to_string(),
                subtitle: None,
                author: "Ada".to_string(),
                description: None,
                number_of_chapters: 10,
                base_language: "en".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_generation_status_reflects_job_row() {
        let db = test_db();
        let project_id = insert_project(&db);
        let job = JobRow::new_pending(JobKind::ContentGeneration, project_id, None);
        job_repo::insert(&db, &job).unwrap();
        job_repo::mark_started(&db, &job.id, "2026-01-01T10:00:00Z").unwrap();
        job_repo::update_progress(&db, &job.id, 25).unwrap();
        job_repo::merge_result(&db, &job.id, &serde_json::json!({"outline": {"chapters": []}}))
            .unwrap();

        let status = StatusService::new(db).generation_status(&job.id).unwrap();
        assert_eq!(status.job_id, job.id);
        assert_eq!(status.kind, "content_generation");
        assert_eq!(status.status, "in_progress");
        assert_eq!(status.progress, 25);
        assert!(status.result.unwrap()["outline"].is_object());
        assert_eq!(status.started_at.as_deref(), Some("2026-01-01T10:00:00Z"));
        assert!(status.completed_at.is_none());
    }

    #[test]
    fn test_generation_status_unknown_job() {
        let db = test_db();
        let err = StatusService::new(db)
            .generation_status("no-such-job")
            .unwrap_err();
        assert!(matches!(err, ServiceError::JobNotFound(_)));
    }

    #[test]
    fn test_download_links_completed_only() {
        let db = test_db();
        let project_id = insert_project(&db);

        document_repo::insert(
            &db,
            &NewDocument {
                project_id,
                doc_type: DocumentType::Pdf,
                language: "en".to_string(),
                filename: "test-book-en.pdf".to_string(),
                url: "file:///out/test-book-en.pdf".to_string(),
                public_id: "test-book-en.pdf".to_string(),
                size_bytes: 1024,
                status: DocumentStatus::Completed,
            },
            "2026-01-01",
        )
        .unwrap();
        document_repo::insert(
            &db,
            &NewDocument {
                project_id,
                doc_type: DocumentType::Docx,
                language: "en".to_string(),
                filename: "test-book-en.docx".to_string(),
                url: "file:///out/test-book-en.docx".to_string(),
                public_id: "test-book-en.docx".to_string(),
                size_bytes: 512,
                status: DocumentStatus::Failed,
            },
            "2026-01-02",
        )
        .unwrap();

        let links = StatusService::new(db).download_links(project_id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].doc_type, "pdf");
        assert_eq!(links[0].url, "file:///out/test-book-en.pdf");
    }

    #[test]
    fn test_download_links_empty_for_unknown_project() {
        let db = test_db();
        let links = StatusService::new(db).download_links(404).unwrap();
        assert!(links.is_empty());
    }
}
