//! Round-robin provider rotation with exponential backoff.
//!
//! Calls go to providers in a fixed circular order. A rate-limited
//! provider makes the client move on to the next one immediately; when
//! a whole pass over the list is throttled, the client backs off and
//! tries the pass again, up to [`MAX_ATTEMPTS`] passes. Non-transient
//! errors are returned to the caller right away.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use tokio::time::sleep;

use crate::config::GenerationConfig;

use super::{GenerationError, Provider, TextGenerator};

/// Maximum number of full passes over the provider list.
pub const MAX_ATTEMPTS: u32 = 5;

/// Rotates generation requests across a list of providers.
pub struct RotationClient<P: TextGenerator> {
    providers: Vec<P>,
    cursor: Mutex<usize>,
    base_delay: Duration,
}

impl<P: TextGenerator> RotationClient<P> {
    /// Creates a rotation client over the given providers.
    ///
    /// An empty provider list is a configuration error and is rejected
    /// here rather than on first use.
    pub fn new(providers: Vec<P>, base_delay: Duration) -> Result<Self, GenerationError> {
        if providers.is_empty() {
            return Err(GenerationError::NoProviders);
        }
        Ok(Self {
            providers,
            cursor: Mutex::new(0),
            base_delay,
        })
    }

    /// Returns the number of configured providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Advances the shared cursor and returns the index to use.
    fn next_index(&self) -> usize {
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = *cursor;
        *cursor = (index + 1) % self.providers.len();
        index
    }

    /// One pass over the provider list.
    ///
    /// Transient errors rotate to the next provider; anything else is
    /// returned immediately. If every provider was throttled the last
    /// transient error is returned.
    async fn rotate_once(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut last_transient = None;
        for _ in 0..self.providers.len() {
            let index = self.next_index();
            match self.providers[index].generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    warn!("Provider {index} throttled, rotating: {e}");
                    last_transient = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_transient.unwrap_or(GenerationError::NoProviders))
    }

    /// Generates text, retrying throttled passes with exponential backoff.
    ///
    /// The delay before retrying pass `n + 1` is `base_delay * 2^(n-1)`,
    /// so with the default five passes the total wait is 15x the base.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.rotate_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        "All providers throttled on attempt {attempt}, retrying in {}ms",
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(GenerationError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl RotationClient<Provider> {
    /// Builds the production rotation client from configuration.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let mut providers = Vec::with_capacity(config.providers.len());
        for provider_config in &config.providers {
            providers.push(Provider::from_config(
                provider_config,
                config.request_timeout_secs,
            )?);
        }
        Self::new(providers, Duration::from_millis(config.base_delay_ms))
    }
}

#[async_trait]
impl<P: TextGenerator> TextGenerator for RotationClient<P> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_text(prompt).await
    }
}
