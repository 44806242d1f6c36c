//! §6.1 capability interfaces. Every external collaborator — input source,
//! artifact store, extractor, media describer, embeddings provider, vector
//! store — is a single trait with exactly the operations each needs to
//! expose. A tagged enum over concrete providers implements each (see
//! `crate::providers`), so the pipeline never needs a trait object.

use crate::model::{ChunkDocument, ExtractedPage};
use anyhow::Result;
use async_trait::async_trait;

/// One document as enumerated by the input source: its name, raw bytes, and
/// an origin URL (`file://…` or `http(s)://…`).
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
    pub origin_url: String,
}

#[async_trait]
pub trait InputSource: Send + Sync {
    /// Enumerate every source document. Implementations may stream from disk
    /// or a remote listing; the default filesystem source walks a directory.
    async fn list(&self) -> Result<Vec<SourceDocument>>;
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write_page_json(&self, doc_name: &str, page_idx: usize, obj: &serde_json::Value) -> Result<String>;
    async fn write_page_rendering(&self, doc_name: &str, page_idx: usize, bytes: &[u8]) -> Result<String>;
    async fn write_full_document(&self, doc_name: &str, bytes: &[u8]) -> Result<String>;
    async fn write_chunk_json(
        &self,
        doc_name: &str,
        page_idx: usize,
        chunk_idx: usize,
        obj: &serde_json::Value,
    ) -> Result<Option<String>>;
    async fn write_image(
        &self,
        doc_name: &str,
        page_idx: usize,
        original_name: &str,
        bytes: &[u8],
        figure_idx_on_page: usize,
    ) -> Result<String>;
    async fn write_manifest(&self, doc_name: &str, obj: &serde_json::Value) -> Result<String>;
    async fn write_status(&self, name: &str, obj: &serde_json::Value) -> Result<String>;
    async fn delete_artifacts(&self, doc_name: &str) -> Result<usize>;
    async fn delete_all(&self) -> Result<usize>;
    /// Idempotent provisioning (create containers/directories, etc).
    async fn ensure_ready(&self) -> Result<()>;
    /// Whether this store hands back remote (dereferenceable-by-others) URLs,
    /// per the §6.2 external-URL contract.
    fn is_remote(&self) -> bool;
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], filename: &str, process_figures: bool) -> Result<Vec<ExtractedPage>>;
    /// Whether this format is paginated (PDF) vs. flat/presentation.
    fn is_paginated(&self, filename: &str) -> bool;
    fn is_presentation(&self, filename: &str) -> bool;
}

#[async_trait]
pub trait MediaDescriber: Send + Sync {
    /// `Ok(None)` is an acceptable, non-fatal outcome: the pipeline proceeds
    /// without a description.
    async fn describe(&self, bytes: &[u8]) -> Result<Option<String>>;
}

#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    /// Order-preserving batch embedding. The provider handles its own
    /// micro-batching and rate limiting internally.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
    fn max_seq_length(&self) -> usize;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent upsert keyed by `chunk_id`. Returns the number of chunks
    /// successfully written.
    async fn upload(&self, docs: &[ChunkDocument], include_embeddings: bool) -> Result<usize>;
    async fn delete_by_filename(&self, filename: &str) -> Result<usize>;
    async fn delete_all(&self) -> Result<usize>;
    fn dimensions(&self) -> usize;
    /// Whether the store generates embeddings itself (integrated
    /// vectorization): when true, the pipeline omits the `embedding` field.
    fn integrated_vectorization(&self) -> bool {
        false
    }
}
