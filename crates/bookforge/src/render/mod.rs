//! Document rendering for generated books.
//!
//! Renders an assembled [`BookContent`] into a downloadable file. The
//! PDF path builds the object graph in memory with `lopdf`; the DOCX
//! path writes a minimal OOXML package with `quick-xml` and `zip`.

pub mod docx;
pub mod pdf;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Supported output document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Pdf,
    Docx,
}

impl DocumentType {
    /// Lowercase name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
        }
    }

    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Parses a document type name, accepting any casing.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chapter ready for rendering.
#[derive(Debug, Clone)]
pub struct RenderChapter {
    pub title: String,
    pub content: String,
}

/// An image to embed in the rendered document.
#[derive(Debug, Clone)]
pub struct RenderImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Everything a renderer needs to produce one document.
#[derive(Debug, Clone)]
pub struct BookContent {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub language: String,
    pub chapters: Vec<RenderChapter>,
    pub images: Vec<RenderImage>,
}

impl BookContent {
    fn filename(&self, doc_type: DocumentType) -> String {
        format!(
            "{}-{}.{}",
            slugify(&self.title),
            self.language,
            doc_type.extension()
        )
    }
}

/// A rendered document ready for upload.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub buffer: Vec<u8>,
    pub filename: String,
}

/// Renders book content into the requested format.
pub fn render(doc_type: DocumentType, content: &BookContent) -> Result<RenderedDocument, RenderError> {
    if content.chapters.is_empty() {
        return Err(RenderError::EmptyDocument);
    }
    let buffer = match doc_type {
        DocumentType::Pdf => pdf::render_pdf(content)?,
        DocumentType::Docx => docx::render_docx(content)?,
    };
    Ok(RenderedDocument {
        buffer,
        filename: content.filename(doc_type),
    })
}

/// Turns a book title into a safe filename stem.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("book");
    }
    slug
}

#[cfg(test)]
pub(crate) fn sample_content() -> BookContent {
    BookContent {
        title: "Async Rust in Practice".to_string(),
        subtitle: Some("Patterns that hold up".to_string()),
        author: "Ada Lovelace".to_string(),
        language: "en".to_string(),
        chapters: vec![
            RenderChapter {
                title: "Title Page".to_string(),
                content: "Async Rust in Practice\n\nAda Lovelace".to_string(),
            },
            RenderChapter {
                title: "Getting Started".to_string(),
                content: "The runtime schedules tasks cooperatively.\n\nEach task yields at await points.".to_string(),
            },
        ],
        images: vec![],
    }
}
