//! Prompt builders for each generation step.

use std::fmt::Write;

use chrono::{Datelike, Utc};

use super::outline::{OutlineChapter, SECTIONS_PER_CHAPTER, SUBSECTIONS_PER_SECTION};

/// How a chapter sits in the overall book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterRole {
    Introduction,
    Body,
    Conclusion,
}

impl ChapterRole {
    fn instruction(&self) -> &'static str {
        match self {
            ChapterRole::Introduction => {
                "This is the introduction. Set up the book's premise, explain who it is for \
                 and preview what the reader will learn."
            }
            ChapterRole::Body => {
                "This is a main chapter. Develop its topic in depth with concrete examples, \
                 building on the chapters before it."
            }
            ChapterRole::Conclusion => {
                "This is the conclusion. Tie the book's threads together, summarize the key \
                 takeaways and leave the reader with next steps."
            }
        }
    }
}

/// Builds the outline request prompt.
pub fn outline_prompt(
    title: &str,
    subtitle: Option<&str>,
    description: Option<&str>,
    chapters: u32,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Create a detailed outline for a book titled \"{title}\".");
    if let Some(subtitle) = subtitle {
        let _ = writeln!(prompt, "Subtitle: {subtitle}");
    }
    if let Some(description) = description {
        let _ = writeln!(prompt, "Description: {description}");
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "The outline must have exactly {chapters} chapters. Every chapter must have \
         exactly {SECTIONS_PER_CHAPTER} sections and every section exactly \
         {SUBSECTIONS_PER_SECTION} subsections."
    );
    let _ = writeln!(prompt, "Chapter 1 is the introduction and chapter {chapters} is the conclusion.");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Return a JSON object with shape:");
    prompt.push_str(
        r#"{"chapters":[{"chapterNumber":1,"title":"...","sections":[{"title":"...","subsections":["...","...","..."]}]}]}"#,
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Return JSON only, no commentary.");
    prompt
}

/// Builds the copyright page prompt.
pub fn copyright_prompt(title: &str, author: &str) -> String {
    let year = Utc::now().year();
    format!(
        "Write a standard copyright page for the book \"{title}\" by {author}, \
         copyright year {year}. Include an all-rights-reserved notice and a short \
         disclaimer. Return plain text only."
    )
}

/// Builds the about-this-book page prompt.
pub fn about_book_prompt(title: &str, description: Option<&str>) -> String {
    let mut prompt = format!(
        "Write an \"About This Book\" page for the book \"{title}\". \
         Describe what the book covers and who should read it, in two or three \
         paragraphs of plain text."
    );
    if let Some(description) = description {
        let _ = write!(prompt, "\n\nThe author describes the book as: {description}");
    }
    prompt
}

/// Builds the prompt for one chapter from its outline entry.
pub fn chapter_prompt(book_title: &str, chapter: &OutlineChapter, role: ChapterRole) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Write chapter {} of the book \"{book_title}\", titled \"{}\".",
        chapter.chapter_number, chapter.title
    );
    let _ = writeln!(prompt, "{}", role.instruction());
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Cover these sections in order:");
    for section in &chapter.sections {
        let _ = writeln!(prompt, "- {}", section.title);
        for subsection in &section.subsections {
            let _ = writeln!(prompt, "  - {subsection}");
        }
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Write flowing prose with section headings. Return the chapter text only, \
         without the book title or chapter number."
    );
    prompt
}
