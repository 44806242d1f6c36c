//! Pipeline configuration (§2.1 ambient config / §5 concurrency defaults).
//! TOML-backed, with an `Option<SubConfig>`-with-defaults shape so partial
//! config files only override what they mention.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub document: Option<DocumentConfig>,
    pub chunker: Option<ChunkerSection>,
    pub providers: Option<ProvidersConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DocumentConfig {
    pub input_dir: Option<PathBuf>,
    pub artifact_dir: Option<PathBuf>,
    pub process_figures: Option<bool>,
}

/// Mirrors [`doc_chunker::ChunkerConfig`] field-for-field so the pipeline's
/// TOML surface doesn't need a second schema. `embedding_max_tokens` is
/// intentionally absent here: it's filled in at runtime from the configured
/// embeddings provider's `max_seq_length()`, per §4.1's dynamic adjustment.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ChunkerSection {
    pub max_tokens: Option<usize>,
    pub max_section_tokens: Option<usize>,
    pub max_chars: Option<usize>,
    pub overlap_percent: Option<f32>,
    pub cross_page_overlap: Option<bool>,
    pub disable_char_limit: Option<bool>,
    pub table_legend_buffer_multiplier: Option<f32>,
}

impl ChunkerSection {
    pub fn into_chunker_config(self) -> doc_chunker::ChunkerConfig {
        let defaults = doc_chunker::ChunkerConfig::default();
        doc_chunker::ChunkerConfig {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_section_tokens: self.max_section_tokens.unwrap_or(defaults.max_section_tokens),
            max_chars: self.max_chars.unwrap_or(defaults.max_chars),
            overlap_percent: self.overlap_percent.unwrap_or(defaults.overlap_percent),
            cross_page_overlap: self.cross_page_overlap.unwrap_or(defaults.cross_page_overlap),
            disable_char_limit: self.disable_char_limit.unwrap_or(defaults.disable_char_limit),
            embedding_max_tokens: None,
            table_legend_buffer_multiplier: self
                .table_legend_buffer_multiplier
                .unwrap_or(defaults.table_legend_buffer_multiplier),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ProvidersConfig {
    pub vector_store_path: Option<PathBuf>,
    pub use_deterministic_embeddings: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConcurrencyConfig {
    pub max_documents: Option<usize>,
    pub max_figure_extraction: Option<usize>,
    pub max_image_processing: Option<usize>,
    pub max_batch_uploads: Option<usize>,
    pub max_extractor_requests: Option<usize>,
    pub max_embedding_requests: Option<usize>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_documents: None,
            max_figure_extraction: None,
            max_image_processing: None,
            max_batch_uploads: None,
            max_extractor_requests: None,
            max_embedding_requests: None,
        }
    }
}

/// §5's parallelism-tier defaults, resolved once at pipeline construction.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimits {
    pub documents: usize,
    pub figure_extraction: usize,
    pub image_processing: usize,
    pub batch_uploads: usize,
    pub extractor_requests: usize,
    pub embedding_requests: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            documents: 4,
            figure_extraction: 5,
            image_processing: 8,
            batch_uploads: 5,
            extractor_requests: 3,
            embedding_requests: 5,
        }
    }
}

impl ConcurrencyConfig {
    pub fn resolve(&self) -> ConcurrencyLimits {
        let defaults = ConcurrencyLimits::default();
        ConcurrencyLimits {
            documents: self.max_documents.unwrap_or(defaults.documents),
            figure_extraction: self.max_figure_extraction.unwrap_or(defaults.figure_extraction),
            image_processing: self.max_image_processing.unwrap_or(defaults.image_processing),
            batch_uploads: self.max_batch_uploads.unwrap_or(defaults.batch_uploads),
            extractor_requests: self.max_extractor_requests.unwrap_or(defaults.extractor_requests),
            embedding_requests: self.max_embedding_requests.unwrap_or(defaults.embedding_requests),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PipelineConfig {
    /// Retry with the offline extractor once when a configured remote
    /// extractor fails transiently (§4.2 failure semantics).
    pub offline_fallback: Option<bool>,
}

impl PipelineConfig {
    pub fn offline_fallback(&self) -> bool {
        self.offline_fallback.unwrap_or(false)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "doc-ingest")
        .context("could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file as TOML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_defaults_match_spec_tiers() {
        let limits = ConcurrencyConfig::default().resolve();
        assert_eq!(limits.documents, 4);
        assert_eq!(limits.figure_extraction, 5);
        assert_eq!(limits.image_processing, 8);
        assert_eq!(limits.batch_uploads, 5);
        assert_eq!(limits.extractor_requests, 3);
        assert_eq!(limits.embedding_requests, 5);
    }

    #[test]
    fn concurrency_config_overrides_individual_tiers() {
        let cfg = ConcurrencyConfig {
            max_documents: Some(10),
            ..Default::default()
        };
        let limits = cfg.resolve();
        assert_eq!(limits.documents, 10);
        assert_eq!(limits.figure_extraction, 5);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.document.is_none());
    }

    #[test]
    fn chunker_section_fills_unset_fields_from_chunker_defaults() {
        let section = ChunkerSection { max_tokens: Some(300), ..Default::default() };
        let cfg = section.into_chunker_config();
        assert_eq!(cfg.max_tokens, 300);
        assert_eq!(cfg.max_section_tokens, doc_chunker::ChunkerConfig::default().max_section_tokens);
    }
}
