//! Book lifecycle events for real-time progress streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::render::DocumentType;

/// An event emitted while a book is generated or rendered.
///
/// Serialized with an `event` tag so listeners can route on the event
/// name and treat the remaining fields as the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BookEvent {
    /// A main chapter finished generating.
    #[serde(rename_all = "camelCase")]
    ChapterGenerated {
        job_id: String,
        project_id: i64,
        chapter_number: u32,
        total_chapters: u32,
        timestamp: DateTime<Utc>,
    },
    /// The whole generation pipeline finished successfully.
    #[serde(rename_all = "camelCase")]
    GenerationCompleted {
        job_id: String,
        project_id: i64,
        total_chapters: u32,
        timestamp: DateTime<Utc>,
    },
    /// The generation pipeline failed.
    #[serde(rename_all = "camelCase")]
    GenerationFailed {
        job_id: String,
        project_id: i64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A rendered document was stored and is ready for download.
    #[serde(rename_all = "camelCase")]
    DocumentReady {
        project_id: i64,
        document_id: i64,
        doc_type: DocumentType,
        language: String,
        timestamp: DateTime<Utc>,
    },
}

impl BookEvent {
    /// Creates a chapter-generated event.
    pub fn chapter_generated(
        job_id: &str,
        project_id: i64,
        chapter_number: u32,
        total_chapters: u32,
    ) -> Self {
        Self::ChapterGenerated {
            job_id: job_id.to_string(),
            project_id,
            chapter_number,
            total_chapters,
            timestamp: Utc::now(),
        }
    }

    /// Creates a generation-completed event.
    pub fn generation_completed(job_id: &str, project_id: i64, total_chapters: u32) -> Self {
        Self::GenerationCompleted {
            job_id: job_id.to_string(),
            project_id,
            total_chapters,
            timestamp: Utc::now(),
        }
    }

    /// Creates a generation-failed event.
    pub fn generation_failed(job_id: &str, project_id: i64, error: &str) -> Self {
        Self::GenerationFailed {
            job_id: job_id.to_string(),
            project_id,
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a document-ready event.
    pub fn document_ready(
        project_id: i64,
        document_id: i64,
        doc_type: DocumentType,
        language: &str,
    ) -> Self {
        Self::DocumentReady {
            project_id,
            document_id,
            doc_type,
            language: language.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts book events to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: Arc<broadcast::Sender<BookEvent>>,
}

impl EventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: BookEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for book events.
    pub fn subscribe(&self) -> broadcast::Receiver<BookEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
