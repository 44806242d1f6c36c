//! Orchestration layer for the document-ingestion pipeline: configuration,
//! retry discipline, the per-document pipeline (C10), and the pipeline
//! runner that dispatches ADD/REMOVE/REMOVE_ALL across documents (C11).

pub mod cancel;
pub mod config;
pub mod pipeline;
pub mod retry;
pub mod runner;
pub mod slug;

pub use cancel::{CancelHandle, CancelSignal};
pub use config::{
    ChunkerSection, Config, ConcurrencyConfig, ConcurrencyLimits, DocumentConfig, PipelineConfig,
    ProvidersConfig, default_config_path, load_config,
};
pub use pipeline::DocumentPipeline;
pub use runner::{Action, PipelineRunner, PipelineStatus, ValidationResult};
