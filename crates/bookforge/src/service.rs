//! Write-side services: starting generation runs and queueing
//! document renders.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::broadcast::EventBroadcaster;
use crate::db::job_repo::{self, JobKind, JobRow};
use crate::db::project_repo::{self, ProjectMetadata, ProjectRow};
use crate::db::{queue_repo, Database};
use crate::error::ServiceError;
use crate::generation::TextGenerator;
use crate::pipeline::{Pipeline, PipelineContext, GENERATION_STEPS};
use crate::worker::RenderTask;

/// Smallest book the pipeline generates.
pub const MIN_CHAPTERS: u32 = 5;
/// Largest book the pipeline generates.
pub const MAX_CHAPTERS: u32 = 30;

/// Book metadata submitted with a generation request.
///
/// The request doubles as a metadata update: present fields replace the
/// stored project values before the run starts, absent optional fields
/// keep them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    pub author: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_chapters: Option<u32>,
}

/// Receipt for a spawned generation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedGeneration {
    pub job_id: String,
    pub project_id: i64,
    /// The pipeline phases the job will walk through, in order.
    pub steps: &'static [&'static str],
}

/// Receipt for an enqueued render task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedDocument {
    pub task_id: String,
    pub project_id: i64,
}

/// Starts book generation runs.
pub struct GenerationService {
    db: Database,
    generator: Arc<dyn TextGenerator>,
    events: EventBroadcaster,
}

impl GenerationService {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>, events: EventBroadcaster) -> Self {
        Self {
            db,
            generator,
            events,
        }
    }

    /// Applies the request metadata to the project, creates the
    /// tracking job and spawns the pipeline.
    ///
    /// Returns as soon as the job row exists. The run itself happens on
    /// a background task and reports through the job row and the event
    /// channel; callers poll [`crate::queries::StatusService`] or
    /// subscribe to events.
    pub fn start_generation(
        &self,
        project_id: i64,
        request: &GenerationRequest,
    ) -> Result<StartedGeneration, ServiceError> {
        let project = project_repo::find_by_id(&self.db, project_id)?
            .ok_or(ServiceError::ProjectNotFound(project_id))?;

        let chapters = request
            .number_of_chapters
            .unwrap_or(project.number_of_chapters);
        if !(MIN_CHAPTERS..=MAX_CHAPTERS).contains(&chapters) {
            return Err(ServiceError::InvalidChapterCount {
                min: MIN_CHAPTERS,
                max: MAX_CHAPTERS,
                given: chapters,
            });
        }

        let now = Utc::now().to_rfc3339();
        let meta = ProjectMetadata {
            title: request.title.clone(),
            subtitle: request.subtitle.clone().or_else(|| project.subtitle.clone()),
            author: request.author.clone(),
            description: request
                .description
                .clone()
                .or_else(|| project.description.clone()),
            number_of_chapters: chapters,
        };
        if !project_repo::update_metadata(&self.db, project_id, &meta, &now)? {
            return Err(ServiceError::ProjectNotFound(project_id));
        }
        // The pipeline reads metadata from its context, so hand it the
        // row as just written.
        let project = ProjectRow {
            title: meta.title,
            subtitle: meta.subtitle,
            author: meta.author,
            description: meta.description,
            number_of_chapters: meta.number_of_chapters,
            updated_at: now,
            ..project
        };

        let input = json!({
            "projectId": project_id,
            "numberOfChapters": chapters,
            "title": project.title.clone(),
        });
        let job = JobRow::new_pending(
            JobKind::ContentGeneration,
            project_id,
            Some(input.to_string()),
        );
        job_repo::insert(&self.db, &job)?;

        info!("Starting generation job {} for project {project_id}", job.id);

        let receipt = StartedGeneration {
            job_id: job.id.clone(),
            project_id,
            steps: &GENERATION_STEPS,
        };

        let pipeline = Pipeline::new(
            self.db.clone(),
            Arc::clone(&self.generator),
            self.events.clone(),
        );
        let ctx = PipelineContext::new(job.id, project);
        tokio::spawn(pipeline.run(ctx));

        Ok(receipt)
    }
}

/// Queues document render tasks.
pub struct DocumentService {
    db: Database,
}

impl DocumentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validates the project and puts the task on the durable queue.
    pub fn request_document(&self, task: &RenderTask) -> Result<QueuedDocument, ServiceError> {
        if project_repo::find_by_id(&self.db, task.project_id)?.is_none() {
            return Err(ServiceError::ProjectNotFound(task.project_id));
        }

        let payload = serde_json::to_string(task)?;
        let task_id = queue_repo::enqueue(
            &self.db,
            task.project_id,
            &payload,
            &Utc::now().to_rfc3339(),
        )?;

        info!(
            "Queued {} render for project {} in '{}'",
            task.doc_type, task.project_id, task.language
        );

        Ok(QueuedDocument {
            task_id,
            project_id: task.project_id,
        })
    }
}
