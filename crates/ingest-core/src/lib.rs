//! Domain model, capability interfaces, and default local providers for the
//! document-ingestion pipeline (§3 and §6 of the design document). The
//! per-document pipeline orchestration (C10/C11) that drives these pieces
//! lives one crate up, in `ingest-pipeline`.

pub mod capability;
pub mod chunk_resolve;
pub mod embedder;
pub mod embedder_unixcoder;
pub mod encoding;
pub mod hyperlink;
pub mod model;
pub mod page_split;
pub mod providers;
pub mod table_render;

pub use capability::{
    ArtifactStore, EmbeddingsProvider, Extractor, InputSource, MediaDescriber, SourceDocument,
    VectorStore,
};
pub use chunk_resolve::chunk_and_resolve;
pub use embedder::{cosine_similarity, EmbedderBackend, EmbeddingResult};
pub use embedder_unixcoder::{UniXcoderEmbedder, UNIXCODER_DIM};
pub use encoding::{decode_to_utf8, decode_with_encoding, detect_encoding, DetectedEncoding};
pub use hyperlink::weave_hyperlinks;
pub use model::{
    BBox, CellKind, ChunkArtifact, ChunkDocument, ChunkRecord, DocumentMeta, ExtractedImage,
    ExtractedPage, ExtractedTable, FigureType, IngestionResult, PageHyperlink, PageRef, TableCell,
    TextChunk,
};
pub use page_split::{split_pages, SplitPage};
pub use providers::{
    ArtifactStoreImpl, CandleEmbeddings, DeterministicEmbeddings, DirectoryInputSource,
    EmbeddingsProviderImpl, ExtractorImpl, InputSourceImpl, LocalArtifactStore,
    MediaDescriberImpl, NoopDescriber, OfficeExtractor, PlainTextExtractor, SqliteVectorStore,
    VectorStoreImpl,
};
pub use table_render::{render_table, TableRenderMode};

/// Create the appropriate compute device for the local embeddings backend.
pub fn make_device() -> candle_core::Device {
    #[cfg(target_os = "macos")]
    {
        candle_core::Device::new_metal(0).unwrap_or(candle_core::Device::Cpu)
    }
    #[cfg(not(target_os = "macos"))]
    {
        candle_core::Device::Cpu
    }
}
