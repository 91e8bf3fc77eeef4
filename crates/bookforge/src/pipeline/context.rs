use crate::db::project_repo::ProjectRow;
use crate::generation::Outline;

/// Mutable state threaded through a single pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    /// Job row tracking this run.
    pub job_id: String,

    /// Project the book is generated for.
    pub project: ProjectRow,

    /// How many outline chapters were requested.
    pub requested_chapters: u32,

    /// Set by the outline step, `Some` for every step after it.
    pub outline: Option<Outline>,
}

impl PipelineContext {
    pub fn new(job_id: impl Into<String>, project: ProjectRow) -> Self {
        let requested_chapters = project.number_of_chapters;
        Self {
            job_id: job_id.into(),
            project,
            requested_chapters,
            outline: None,
        }
    }
}
