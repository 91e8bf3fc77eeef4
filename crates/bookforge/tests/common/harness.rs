//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct provides a complete isolated environment
//! for driving the generation pipeline and the render worker:
//! - In-memory database with all migrations applied
//! - Temporary directories for stored documents and uploaded images
//! - Event broadcaster shared between pipeline, worker and assertions

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

use bookforge::db::project_repo::{self, NewProject};
use bookforge::db::{chapter_repo, job_repo, queue_repo};
use bookforge::db::job_repo::{JobKind, JobRow};
use bookforge::worker::{RenderTask, RenderWorker};
use bookforge::{
    BookEvent, Database, DocumentService, EventBroadcaster, FileStorage, GenerationService,
    Pipeline, StatusService, TextGenerator,
};

/// Test harness providing an isolated environment for integration tests.
pub struct TestHarness {
    /// Temporary directory containing the storage and image subdirectories.
    temp_dir: TempDir,
    /// In-memory database with all migrations applied.
    pub db: Database,
    /// Shared event broadcaster.
    pub events: EventBroadcaster,
    /// Where rendered documents end up.
    pub storage_dir: PathBuf,
    /// Where test image files are written.
    pub images_dir: PathBuf,
}

impl TestHarness {
    /// Create a new test harness.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage_dir = temp_dir.path().join("documents");
        let images_dir = temp_dir.path().join("images");
        std::fs::create_dir_all(&storage_dir).expect("Failed to create storage dir");
        std::fs::create_dir_all(&images_dir).expect("Failed to create images dir");

        Self {
            temp_dir,
            db: Database::open_in_memory().expect("Failed to create test database"),
            events: EventBroadcaster::new(64),
            storage_dir,
            images_dir,
        }
    }

    /// Insert a project and return its id.
    pub fn insert_project(&self, project: NewProject) -> i64 {
        project_repo::insert(&self.db, &project).expect("Failed to insert project")
    }

    /// Insert a pending content generation job for the project.
    pub fn start_job(&self, project_id: i64) -> JobRow {
        let job = JobRow::new_pending(JobKind::ContentGeneration, project_id, None);
        job_repo::insert(&self.db, &job).expect("Failed to insert job");
        job
    }

    /// Insert chapter rows with ordinals 1, 2, 3, ...
    pub fn seed_chapters(&self, project_id: i64, chapters: &[(&str, &str)]) {
        let now = Utc::now().to_rfc3339();
        for (i, (title, content)) in chapters.iter().enumerate() {
            chapter_repo::insert(&self.db, project_id, i as u32 + 1, title, content, &now)
                .expect("Failed to insert chapter");
        }
    }

    /// Serialize a render task and push it onto the queue.
    pub fn enqueue_task(&self, task: &RenderTask) -> String {
        let payload = serde_json::to_string(task).expect("Failed to encode task");
        queue_repo::enqueue(
            &self.db,
            task.project_id,
            &payload,
            &Utc::now().to_rfc3339(),
        )
        .expect("Failed to enqueue task")
    }

    /// Write an image file into the images directory.
    pub fn write_image(&self, filename: &str, bytes: &[u8]) -> PathBuf {
        let path = self.images_dir.join(filename);
        std::fs::write(&path, bytes).expect("Failed to write image");
        path
    }

    /// Subscribe to book events. Call before acting so nothing is missed.
    pub fn subscribe(&self) -> Receiver<BookEvent> {
        self.events.subscribe()
    }

    /// Create a pipeline wired to this harness.
    pub fn pipeline(&self, generator: Arc<dyn TextGenerator>) -> Pipeline {
        Pipeline::new(self.db.clone(), generator, self.events.clone())
    }

    /// Create a generation service wired to this harness.
    pub fn generation_service(&self, generator: Arc<dyn TextGenerator>) -> GenerationService {
        GenerationService::new(self.db.clone(), generator, self.events.clone())
    }

    /// Create a document service wired to this harness.
    pub fn document_service(&self) -> DocumentService {
        DocumentService::new(self.db.clone())
    }

    /// Create a status query service wired to this harness.
    pub fn status_service(&self) -> StatusService {
        StatusService::new(self.db.clone())
    }

    /// Create a render worker with no spacing between tasks.
    pub fn render_worker(&self) -> RenderWorker {
        self.render_worker_with_spacing(Duration::ZERO, Duration::from_millis(10))
    }

    /// Create a render worker with explicit spacing and poll settings.
    pub fn render_worker_with_spacing(
        &self,
        min_spacing: Duration,
        poll_interval: Duration,
    ) -> RenderWorker {
        RenderWorker::new(
            self.db.clone(),
            Arc::new(FileStorage::new(&self.storage_dir)),
            self.events.clone(),
            min_spacing,
            poll_interval,
        )
    }

    /// Resolve a stored document by its public id.
    pub fn stored_document(&self, public_id: &str) -> PathBuf {
        self.storage_dir.join(public_id)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain all events currently buffered on a receiver.
pub fn collect_events(rx: &mut Receiver<BookEvent>) -> Vec<BookEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
