//! Book outline parsing and structural validation.
//!
//! The outline is the contract between the outline step and everything
//! after it: exactly the requested number of chapters, three sections
//! per chapter, three subsections per section. Model output is only
//! accepted once it satisfies that shape.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Required sections per chapter.
pub const SECTIONS_PER_CHAPTER: usize = 3;
/// Required subsections per section.
pub const SUBSECTIONS_PER_SECTION: usize = 3;

/// A structured book outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub chapters: Vec<OutlineChapter>,
}

/// One chapter of the outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineChapter {
    pub chapter_number: u32,
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

/// One section of an outline chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSection {
    pub title: String,
    pub subsections: Vec<String>,
}

/// Errors raised while parsing or validating an outline.
#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("model output did not contain a JSON object")]
    MissingJson,

    #[error("Failed to parse outline JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("outline has {actual} chapters, expected {expected}")]
    ChapterCountMismatch { expected: u32, actual: u32 },

    #[error("chapter {chapter} has {actual} sections, expected {expected}")]
    SectionCountMismatch {
        chapter: u32,
        expected: usize,
        actual: usize,
    },

    #[error("chapter {chapter} section {section} has {actual} subsections, expected {expected}")]
    SubsectionCountMismatch {
        chapter: u32,
        section: usize,
        expected: usize,
        actual: usize,
    },
}

impl Outline {
    /// Parses an outline from raw model output.
    ///
    /// Models wrap JSON in prose and code fences, so this takes the
    /// widest `{...}` span rather than requiring clean JSON.
    pub fn parse(raw: &str) -> Result<Self, OutlineError> {
        let json = extract_json(raw).ok_or(OutlineError::MissingJson)?;
        Ok(serde_json::from_str(json)?)
    }

    /// Validates the outline shape against the requested chapter count.
    pub fn validate(&self, expected_chapters: u32) -> Result<(), OutlineError> {
        let actual = self.chapters.len() as u32;
        if actual != expected_chapters {
            return Err(OutlineError::ChapterCountMismatch {
                expected: expected_chapters,
                actual,
            });
        }

        for chapter in &self.chapters {
            if chapter.sections.len() != SECTIONS_PER_CHAPTER {
                return Err(OutlineError::SectionCountMismatch {
                    chapter: chapter.chapter_number,
                    expected: SECTIONS_PER_CHAPTER,
                    actual: chapter.sections.len(),
                });
            }
            for (i, section) in chapter.sections.iter().enumerate() {
                if section.subsections.len() != SUBSECTIONS_PER_SECTION {
                    return Err(OutlineError::SubsectionCountMismatch {
                        chapter: chapter.chapter_number,
                        section: i + 1,
                        expected: SUBSECTIONS_PER_SECTION,
                        actual: section.subsections.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Renders a plain-text table of contents from the outline.
    pub fn table_of_contents(&self) -> String {
        let mut toc = String::from("Table of Contents\n");
        for chapter in &self.chapters {
            let _ = writeln!(
                toc,
                "\nChapter {}: {}",
                chapter.chapter_number, chapter.title
            );
            for (i, section) in chapter.sections.iter().enumerate() {
                let _ = writeln!(
                    toc,
                    "  {}.{} {}",
                    chapter.chapter_number,
                    i + 1,
                    section.title
                );
                for (j, subsection) in section.subsections.iter().enumerate() {
                    let _ = writeln!(
                        toc,
                        "    {}.{}.{} {}",
                        chapter.chapter_number,
                        i + 1,
                        j + 1,
                        subsection
                    );
                }
            }
        }
        toc
    }
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
