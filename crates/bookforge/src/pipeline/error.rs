use thiserror::Error;

use crate::db::DatabaseError;
use crate::generation::{GenerationError, OutlineError};

/// Errors that abort a pipeline run.
///
/// None of these escape to a caller. The runner catches them, marks
/// the job failed with the rendered message and moves on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Outline(#[from] OutlineError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
