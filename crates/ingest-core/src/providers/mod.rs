//! Offline-capable default implementations of every capability in
//! [`crate::capability`] (§6.5). Each is a variant of a closed, tagged enum
//! over concrete providers, so adding a backend is a one-variant diff rather
//! than a runtime plugin registry.

pub mod artifact_store;
pub mod embeddings;
pub mod extractor;
pub mod input_source;
pub mod media_describer;
pub mod vector_store;

pub use artifact_store::{ArtifactStoreImpl, LocalArtifactStore};
pub use embeddings::{CandleEmbeddings, DeterministicEmbeddings, EmbeddingsProviderImpl};
pub use extractor::{ExtractorImpl, OfficeExtractor, PlainTextExtractor};
pub use input_source::{DirectoryInputSource, InputSourceImpl};
pub use media_describer::{MediaDescriberImpl, NoopDescriber};
pub use vector_store::{SqliteVectorStore, VectorStoreImpl};
