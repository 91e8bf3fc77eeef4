pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod queries;
pub mod render;
pub mod service;
pub mod storage;
pub mod worker;

pub use broadcast::{BookEvent, EventBroadcaster};
pub use config::{load_config, Config, GenerationConfig, WorkerConfig};
pub use db::{Database, DatabaseError};
pub use error::{
    BookforgeError, ConfigError, RenderError, Result, ServiceError, StorageError, WorkerError,
};
pub use generation::{GenerationError, Provider, ProviderConfig, RotationClient, TextGenerator};
pub use pipeline::{Pipeline, PipelineContext, PipelineError};
pub use queries::{DownloadLink, GenerationStatus, StatusService};
pub use render::{BookContent, DocumentType, RenderedDocument};
pub use service::{
    DocumentService, GenerationRequest, GenerationService, QueuedDocument, StartedGeneration,
};
pub use storage::{FileStorage, ObjectStorage, StoredObject};
pub use worker::{RenderTask, RenderWorker};
