//! Book generation pipeline.
//!
//! A [`Pipeline`] takes a project through outline generation, front
//! matter, the main chapters and the conclusion, persisting each
//! chapter as it lands and reporting progress on the job row. Runs are
//! spawned fire-and-forget; failures are recorded on the job and the
//! project instead of being returned to a caller.

pub mod context;
pub mod error;
pub mod runner;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use runner::{Pipeline, GENERATION_STEPS};
