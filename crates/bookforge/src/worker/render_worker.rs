use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::time::Instant;

use crate::broadcast::{BookEvent, EventBroadcaster};
use crate::db::chapter_repo::{self, ChapterRow};
use crate::db::document_repo::{self, DocumentStatus, NewDocument};
use crate::db::job_repo::{self, JobRow};
use crate::db::project_repo::{self, ProjectRow};
use crate::db::queue_repo::{self, TaskRow};
use crate::db::translation_repo::{self, TranslatedChapter};
use crate::db::{image_repo, Database, DatabaseError};
use crate::error::WorkerError;
use crate::render::{self, BookContent, RenderChapter, RenderImage};
use crate::storage::ObjectStorage;

use super::task::RenderTask;

const PROGRESS_LOADED: u8 = 20;
const PROGRESS_RENDERED: u8 = 50;
const PROGRESS_UPLOADED: u8 = 80;

/// Consumes the render queue one task at a time.
///
/// Rendering holds whole books in memory, so tasks never overlap and
/// consecutive starts are at least `min_spacing` apart.
pub struct RenderWorker {
    db: Database,
    storage: Arc<dyn ObjectStorage>,
    events: EventBroadcaster,
    min_spacing: Duration,
    poll_interval: Duration,
}

impl RenderWorker {
    pub fn new(
        db: Database,
        storage: Arc<dyn ObjectStorage>,
        events: EventBroadcaster,
        min_spacing: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            db,
            storage,
            events,
            min_spacing,
            poll_interval,
        }
    }

    /// Runs until the shutdown flag is set.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!("Render worker started");
        let mut next_start = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            if Instant::now() < next_start {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let started = Instant::now();
            match self.run_once().await {
                Ok(true) => next_start = started + self.min_spacing,
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!("Could not poll render queue: {e}");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        info!("Render worker stopped");
    }

    /// Claims and processes at most one task. Returns whether a task
    /// was claimed.
    pub async fn run_once(&self) -> Result<bool, WorkerError> {
        let now = Utc::now().to_rfc3339();
        let Some(task) = queue_repo::claim_next(&self.db, &now)? else {
            return Ok(false);
        };
        self.handle_task(task).await;
        Ok(true)
    }

    async fn handle_task(&self, row: TaskRow) {
        debug!("Processing render task {} (attempt {})", row.id, row.attempts);

        match self.process(&row).await {
            Ok(document_id) => {
                if let Err(e) = queue_repo::complete(&self.db, &row.id, &Utc::now().to_rfc3339())
                {
                    error!("Could not mark render task {} completed: {e}", row.id);
                }
                info!("Render task {} produced document {document_id}", row.id);
            }
            Err(err) => {
                error!("Render task {} failed: {err}", row.id);
                let result =
                    queue_repo::fail(&self.db, &row.id, &err.to_string(), &Utc::now().to_rfc3339());
                if let Err(e) = result {
                    error!("Could not mark render task {} failed: {e}", row.id);
                }
            }
        }

        log_memory_usage(&row.id);
    }

    async fn process(&self, row: &TaskRow) -> Result<i64, WorkerError> {
        let task: RenderTask = serde_json::from_str(&row.payload)?;

        let job = JobRow::new_pending(task.job_kind(), task.project_id, Some(row.payload.clone()));
        job_repo::insert(&self.db, &job)?;
        job_repo::mark_started(&self.db, &job.id, &Utc::now().to_rfc3339())?;

        match self.render_and_store(&task, &job.id).await {
            Ok(document_id) => {
                job_repo::mark_completed(&self.db, &job.id, &Utc::now().to_rfc3339())?;
                Ok(document_id)
            }
            Err(err) => {
                let now = Utc::now().to_rfc3339();
                if let Err(db_err) = job_repo::mark_failed(&self.db, &job.id, &err.to_string(), &now)
                {
                    error!("Could not record failure on job {}: {db_err}", job.id);
                }
                Err(err)
            }
        }
    }

    async fn render_and_store(&self, task: &RenderTask, job_id: &str) -> Result<i64, WorkerError> {
        let content = self.load_content(task)?;
        job_repo::update_progress(&self.db, job_id, PROGRESS_LOADED)?;

        let doc_type = task.doc_type;
        let rendered = tokio::task::spawn_blocking(move || render::render(doc_type, &content))
            .await
            .map_err(|e| WorkerError::RenderAborted(e.to_string()))??;
        job_repo::update_progress(&self.db, job_id, PROGRESS_RENDERED)?;

        let stored = self
            .storage
            .upload(&rendered.buffer, &rendered.filename)
            .await?;
        job_repo::update_progress(&self.db, job_id, PROGRESS_UPLOADED)?;

        let document_id = document_repo::insert(
            &self.db,
            &NewDocument {
                project_id: task.project_id,
                doc_type: task.doc_type,
                language: task.language.clone(),
                filename: rendered.filename.clone(),
                url: stored.url.clone(),
                public_id: stored.public_id,
                size_bytes: stored.size as i64,
                status: DocumentStatus::Completed,
            },
            &Utc::now().to_rfc3339(),
        )?;

        job_repo::merge_result(
            &self.db,
            job_id,
            &json!({
                "documentId": document_id,
                "url": stored.url,
                "filename": rendered.filename,
            }),
        )?;

        self.events.send(BookEvent::document_ready(
            task.project_id,
            document_id,
            task.doc_type,
            &task.language,
        ));

        Ok(document_id)
    }

    fn load_content(&self, task: &RenderTask) -> Result<BookContent, WorkerError> {
        let project = project_repo::find_by_id(&self.db, task.project_id)?
            .ok_or(WorkerError::ProjectNotFound(task.project_id))?;

        let chapters = chapter_repo::list_for_project(&self.db, task.project_id)?;
        if chapters.is_empty() {
            return Err(WorkerError::NoChapters(task.project_id));
        }

        let translation = if task.language != project.base_language {
            match translation_repo::find(&self.db, task.project_id, &task.language)? {
                Some(stored) => Some(stored.chapter_map().map_err(|e| DatabaseError::Json {
                    column: "chapters",
                    source: e,
                })?),
                None => {
                    warn!(
                        "No '{}' translation for project {}, rendering in '{}'",
                        task.language, task.project_id, project.base_language
                    );
                    None
                }
            }
        } else {
            None
        };

        let images = if task.include_images {
            self.load_images(task.project_id)?
        } else {
            Vec::new()
        };

        Ok(assemble_content(task, &project, chapters, translation, images))
    }

    fn load_images(&self, project_id: i64) -> Result<Vec<RenderImage>, WorkerError> {
        let mut images = Vec::new();
        for row in image_repo::list_for_project(&self.db, project_id)? {
            match std::fs::read(&row.path) {
                Ok(bytes) => images.push(RenderImage {
                    filename: row.filename,
                    bytes,
                }),
                Err(e) => warn!("Skipping image '{}': {e}", row.path),
            }
        }
        Ok(images)
    }
}

/// Builds the renderable book. Task metadata overrides win over the
/// project row; chapters the translation covers are substituted and the
/// rest stay in the base language.
fn assemble_content(
    task: &RenderTask,
    project: &ProjectRow,
    chapters: Vec<ChapterRow>,
    translation: Option<HashMap<u32, TranslatedChapter>>,
    images: Vec<RenderImage>,
) -> BookContent {
    let chapters = chapters
        .into_iter()
        .map(|chapter| {
            match translation
                .as_ref()
                .and_then(|map| map.get(&chapter.ordinal))
            {
                Some(translated) => RenderChapter {
                    title: translated.title.clone(),
                    content: translated.content.clone(),
                },
                None => RenderChapter {
                    title: chapter.title,
                    content: chapter.content,
                },
            }
        })
        .collect();

    BookContent {
        title: task.title.clone().unwrap_or_else(|| project.title.clone()),
        subtitle: task.subtitle.clone().or_else(|| project.subtitle.clone()),
        author: task
            .author
            .clone()
            .unwrap_or_else(|| project.author.clone()),
        language: task.language.clone(),
        chapters,
        images,
    }
}

/// Logs the resident memory of this process. Rendering buffers whole
/// books, so a creeping baseline here is the first sign of a leak.
fn log_memory_usage(task_id: &str) {
    let pid = sysinfo::Pid::from_u32(std::process::id());
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    if let Some(process) = system.process(pid) {
        debug!(
            "Resident memory after task {task_id}: {} MiB",
            process.memory() / (1024 * 1024)
        );
    }
}
