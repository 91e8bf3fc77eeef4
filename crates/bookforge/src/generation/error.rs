//! Errors produced by text generation providers.

use thiserror::Error;

/// Errors that can occur while generating text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No generation providers configured")]
    NoProviders,

    #[error("Provider {provider} is rate limited: {message}")]
    RateLimited { provider: String, message: String },

    #[error("Provider {provider} is overloaded: {message}")]
    Overloaded { provider: String, message: String },

    #[error("HTTP error from {provider}: {message}")]
    Http { provider: String, message: String },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },
}

impl GenerationError {
    /// Whether retrying against another provider (or later) can help.
    ///
    /// Quota and capacity errors clear on their own; everything else is
    /// either a configuration problem or a broken response and retrying
    /// would just burn quota.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. } | GenerationError::Overloaded { .. }
        )
    }
}
