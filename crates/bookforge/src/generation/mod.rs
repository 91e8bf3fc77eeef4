//! Text generation backed by rotating LLM providers.
//!
//! The pipeline talks to a single [`TextGenerator`]; in production that
//! is a [`RotationClient`] wrapping one client per configured provider.

pub mod error;
pub mod outline;
pub mod prompts;
pub mod provider;
pub mod rotation;

pub use error::GenerationError;
pub use outline::{Outline, OutlineChapter, OutlineError, OutlineSection};
pub use prompts::ChapterRole;
pub use provider::{Provider, ProviderConfig};
pub use rotation::{RotationClient, MAX_ATTEMPTS};

use std::sync::Arc;

use async_trait::async_trait;

/// A text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for a prompt, returning the raw model output.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl TextGenerator for Arc<dyn TextGenerator> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}
