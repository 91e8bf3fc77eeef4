use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generation(#[from] crate::generation::GenerationError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Document has no chapters to render")]
    EmptyDocument,

    #[error("Failed to build PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to write DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to write document XML: {0}")]
    Xml(#[from] std::io::Error),

    #[error("Failed to process image '{name}': {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid task payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Project {0} not found")]
    ProjectNotFound(i64),

    #[error("Project {0} has no chapters to render")]
    NoChapters(i64),

    #[error("Render task aborted: {0}")]
    RenderAborted(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Project {0} not found")]
    ProjectNotFound(i64),

    #[error("Number of chapters must be between {min} and {max}, got {given}")]
    InvalidChapterCount { min: u32, max: u32, given: u32 },

    #[error("Failed to encode task payload: {0}")]
    EncodePayload(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, BookforgeError>;
