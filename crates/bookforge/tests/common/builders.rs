//! Builder patterns and scripted generators for test data.
//!
//! These builders allow creating projects, outlines and whole model
//! scripts without repetitive boilerplate code.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;

use bookforge::db::project_repo::NewProject;
use bookforge::{GenerationError, GenerationRequest, TextGenerator};

/// Builder for creating `NewProject` instances.
pub struct ProjectBuilder {
    title: String,
    subtitle: Option<String>,
    author: String,
    description: Option<String>,
    number_of_chapters: u32,
    base_language: String,
}

impl ProjectBuilder {
    /// Create a new builder with sensible defaults for testing.
    pub fn new() -> Self {
        Self {
            title: "The Rust Gardener".to_string(),
            subtitle: None,
            author: "Ada Lovelace".to_string(),
            description: None,
            number_of_chapters: 10,
            base_language: "en".to_string(),
        }
    }

    /// Set the book title.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Set the subtitle.
    pub fn subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = Some(subtitle.to_string());
        self
    }

    /// Set the author.
    pub fn author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    /// Set the back-cover description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Set the requested chapter count.
    pub fn chapters(mut self, count: u32) -> Self {
        self.number_of_chapters = count;
        self
    }

    /// Set the base language of the book.
    pub fn base_language(mut self, language: &str) -> Self {
        self.base_language = language.to_string();
        self
    }

    /// Build the final NewProject.
    pub fn build(self) -> NewProject {
        NewProject {
            title: self.title,
            subtitle: self.subtitle,
            author: self.author,
            description: self.description,
            number_of_chapters: self.number_of_chapters,
            base_language: self.base_language,
        }
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A generation request matching [`ProjectBuilder`]'s defaults, so the
/// accepted run keeps the seeded metadata.
pub fn generation_request() -> GenerationRequest {
    GenerationRequest {
        title: "The Rust Gardener".to_string(),
        subtitle: None,
        author: "Ada Lovelace".to_string(),
        description: None,
        number_of_chapters: None,
    }
}

/// Builds a structurally valid outline JSON string with the given
/// chapter count. Chapter 1 is "Introduction", the last chapter is
/// "Conclusion", everything between is "Chapter {n}".
pub fn outline_json(chapters: u32) -> String {
    let chapters: Vec<_> = (1..=chapters)
        .map(|n| {
            let title = if n == 1 {
                "Introduction".to_string()
            } else if n == chapters {
                "Conclusion".to_string()
            } else {
                format!("Chapter {n}")
            };
            json!({
                "chapterNumber": n,
                "title": title,
                "sections": (1..=3).map(|s| json!({
                    "title": format!("Section {n}.{s}"),
                    "subsections": [
                        format!("Topic {n}.{s}.1"),
                        format!("Topic {n}.{s}.2"),
                        format!("Topic {n}.{s}.3"),
                    ],
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "chapters": chapters }).to_string()
}

/// Wraps an outline in the prose and code fences real models produce.
pub fn outline_response(chapters: u32) -> String {
    format!(
        "Here is the outline you asked for:\n```json\n{}\n```\nLet me know if you need changes.",
        outline_json(chapters)
    )
}

/// The full response script for one successful book generation:
/// outline, copyright, about page, introduction, main chapters and
/// conclusion, in the order the pipeline asks for them.
pub fn book_script(chapters: u32) -> Vec<Result<String, GenerationError>> {
    let mut script = vec![
        Ok(outline_response(chapters)),
        Ok("Copyright (c) 2026. All rights reserved.".to_string()),
        Ok("This book teaches software gardening.".to_string()),
        Ok("Introduction content".to_string()),
    ];
    for n in 2..chapters {
        script.push(Ok(format!("Content of chapter {n}")));
    }
    script.push(Ok("Conclusion content".to_string()));
    script
}

/// A `TextGenerator` that replays a fixed script of responses.
///
/// With a gate semaphore, every call first waits for a permit, which
/// lets tests hold the pipeline mid-flight.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedGenerator {
    /// Create a generator that replays the given responses in order.
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Create a gated generator. Each `generate` call consumes one
    /// permit from the semaphore before answering.
    pub fn gated(responses: Vec<Result<String, GenerationError>>, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(responses)
        }
    }

    /// How many times `generate` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(GenerationError::InvalidResponse {
                    provider: "scripted".to_string(),
                    message: "no scripted response left".to_string(),
                })
            })
    }
}
