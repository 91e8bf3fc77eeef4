//! Translation repository: per-language chapter translations.
//!
//! Translations are stored as one row per `(project_id, language)`
//! with a JSON map from chapter ordinal to translated title/content.
//! Missing ordinals fall back to the base-language chapter at render
//! time.

use std::collections::HashMap;

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// A translated chapter, keyed by the ordinal of the base chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedChapter {
    pub title: String,
    pub content: String,
}

/// A raw translation row from the database.
#[derive(Debug, Clone)]
pub struct TranslationRow {
    pub id: i64,
    pub project_id: i64,
    pub language: String,
    pub chapters: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TranslationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            language: row.get("language")?,
            chapters: row.get("chapters")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Parses the JSON chapter map. Keys are chapter ordinals.
    pub fn chapter_map(&self) -> Result<HashMap<u32, TranslatedChapter>, serde_json::Error> {
        serde_json::from_str(&self.chapters)
    }
}

/// Inserts or replaces the translation for `(project_id, language)`.
pub fn upsert(
    db: &Database,
    project_id: i64,
    language: &str,
    chapters: &HashMap<u32, TranslatedChapter>,
    now: &str,
) -> Result<(), DatabaseError> {
    let chapters_json = serde_json::to_string(chapters).map_err(|e| DatabaseError::Json {
        column: "chapters",
        source: e,
    })?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO translations (project_id, language, chapters, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (project_id, language)
             DO UPDATE SET chapters = excluded.chapters, updated_at = excluded.updated_at",
            params![project_id, language, chapters_json, now],
        )?;
        Ok(())
    })
}

/// Finds the translation for `(project_id, language)`.
pub fn find(
    db: &Database,
    project_id: i64,
    language: &str,
) -> Result<Option<TranslationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM translations WHERE project_id = ?1 AND language = ?2")?;
        let mut rows = stmt.query_map(params![project_id, language], TranslationRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}
