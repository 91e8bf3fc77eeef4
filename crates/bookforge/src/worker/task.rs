use serde::{Deserialize, Serialize};

use crate::db::job_repo::JobKind;
use crate::render::DocumentType;

/// Payload of one queued render task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderTask {
    pub project_id: i64,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    /// Language to render in. When it differs from the project's base
    /// language a stored translation is substituted chapter by chapter.
    pub language: String,

    /// Title override for this rendition; falls back to the project title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Subtitle override; falls back to the project subtitle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Author override; falls back to the project author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Include the project's uploaded images as plates.
    #[serde(default)]
    pub include_images: bool,
}

impl RenderTask {
    pub fn new(project_id: i64, doc_type: DocumentType, language: &str) -> Self {
        Self {
            project_id,
            doc_type,
            language: language.to_string(),
            title: None,
            subtitle: None,
            author: None,
            include_images: false,
        }
    }

    /// The job kind that tracks this task.
    pub fn job_kind(&self) -> JobKind {
        match self.doc_type {
            DocumentType::Pdf => JobKind::PdfGeneration,
            DocumentType::Docx => JobKind::DocxGeneration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let task = RenderTask::new(7, DocumentType::Pdf, "de");
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["projectId"], 7);
        assert_eq!(json["type"], "PDF");
        assert_eq!(json["language"], "de");
        assert_eq!(json["includeImages"], false);
        // Unset overrides are omitted from the payload entirely.
        assert!(json.get("title").is_none());
        assert!(json.get("author").is_none());
    }

    #[test]
    fn test_optional_fields_default() {
        let task: RenderTask =
            serde_json::from_str(r#"{"projectId":1,"type":"DOCX","language":"en"}"#).unwrap();
        assert!(!task.include_images);
        assert_eq!(task.title, None);
        assert_eq!(task.subtitle, None);
        assert_eq!(task.author, None);
        assert_eq!(task.job_kind(), JobKind::DocxGeneration);
    }

    #[test]
    fn test_metadata_overrides_round_trip() {
        let json = r#"{
            "projectId": 3,
            "type": "PDF",
            "language": "en",
            "title": "Gift Edition",
            "author": "B. Binder"
        }"#;
        let task: RenderTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.title.as_deref(), Some("Gift Edition"));
        assert_eq!(task.subtitle, None);
        assert_eq!(task.author.as_deref(), Some("B. Binder"));

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back["title"], "Gift Edition");
        assert!(back.get("subtitle").is_none());
    }

    #[test]
    fn test_job_kind_follows_document_type() {
        assert_eq!(
            RenderTask::new(1, DocumentType::Pdf, "en").job_kind(),
            JobKind::PdfGeneration
        );
        assert_eq!(
            RenderTask::new(1, DocumentType::Docx, "en").job_kind(),
            JobKind::DocxGeneration
        );
    }
}
