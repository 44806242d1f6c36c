//! Integration test for the per-document pipeline (C10) and runner (C11):
//! write a couple of plain-text source files to a temp directory, run them
//! through the full extract → chunk → embed → upsert path against the
//! filesystem/sqlite default backends, and check the observable contract.
//!
//! Uses `DeterministicEmbeddings` rather than the candle model so the test
//! runs offline with no model download required.

use ingest_core::{
    ArtifactStoreImpl, DeterministicEmbeddings, EmbeddingsProvider, EmbeddingsProviderImpl,
    ExtractorImpl, InputSourceImpl, LocalArtifactStore, MediaDescriberImpl, NoopDescriber,
    SqliteVectorStore, VectorStore, VectorStoreImpl,
};
use ingest_pipeline::{Action, CancelHandle, DocumentPipeline, PipelineRunner};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;

type TestPipeline =
    DocumentPipeline<ExtractorImpl, ArtifactStoreImpl, MediaDescriberImpl, EmbeddingsProviderImpl, VectorStoreImpl>;

fn build_pipeline(artifact_dir: &std::path::Path) -> TestPipeline {
    let embeddings = Arc::new(EmbeddingsProviderImpl::Deterministic(DeterministicEmbeddings::new(32, 512)));
    let vector_store = Arc::new(VectorStoreImpl::Sqlite(
        SqliteVectorStore::open_in_memory(embeddings.dimensions()).unwrap(),
    ));
    DocumentPipeline {
        extractor: Arc::new(ExtractorImpl::Auto),
        offline_extractor: None,
        artifact_store: Arc::new(ArtifactStoreImpl::Local(LocalArtifactStore::new(artifact_dir))),
        media_describer: Arc::new(MediaDescriberImpl::Noop(NoopDescriber)),
        embeddings,
        vector_store,
        chunker_config: doc_chunker::ChunkerConfig::default(),
        limits: Default::default(),
        clean_artifacts: true,
        offline_fallback: false,
        extractor_semaphore: Arc::new(Semaphore::new(3)),
        embedding_semaphore: Arc::new(Semaphore::new(5)),
    }
}

#[tokio::test]
async fn process_plain_text_document_indexes_chunks() {
    let artifact_dir = TempDir::new().unwrap();
    let pipeline = build_pipeline(artifact_dir.path());

    let text = "Paragraph one introduces the subject matter in plain prose. \
                Paragraph two continues with more detail about the same topic. \
                Paragraph three wraps up with a short conclusion.";

    let result = pipeline.process("notes.txt", text.as_bytes(), "file:///tmp/notes.txt").await;

    assert!(result.success, "expected success, got error: {:?}", result.error);
    assert!(result.chunks_indexed > 0, "a non-empty document must index at least one chunk");

    let stem_dir = artifact_dir.path().join("notes");
    assert!(stem_dir.join("manifest.json").exists());
    assert!(stem_dir.join("page-0001.json").exists());
}

#[tokio::test]
async fn process_empty_document_indexes_zero_chunks() {
    let artifact_dir = TempDir::new().unwrap();
    let pipeline = build_pipeline(artifact_dir.path());

    let result = pipeline.process("empty.txt", b"", "file:///tmp/empty.txt").await;

    assert!(result.success);
    assert_eq!(result.chunks_indexed, 0);
}

#[tokio::test]
async fn rerunning_add_is_idempotent_on_chunk_count() {
    let artifact_dir = TempDir::new().unwrap();
    let pipeline = build_pipeline(artifact_dir.path());
    let text = "Repeated ingestion of the same document must not grow the index. \
                It should simply replace the previous chunks for this filename.";

    let first = pipeline.process("doc.txt", text.as_bytes(), "file:///tmp/doc.txt").await;
    let second = pipeline.process("doc.txt", text.as_bytes(), "file:///tmp/doc.txt").await;

    assert!(first.success && second.success);
    assert_eq!(first.chunks_indexed, second.chunks_indexed);

    let remaining = pipeline.vector_store.delete_by_filename("doc.txt").await.unwrap();
    assert_eq!(remaining, second.chunks_indexed, "no duplicate rows should accumulate across re-runs");
}

#[tokio::test]
async fn runner_add_fans_out_over_a_directory() {
    let input_dir = TempDir::new().unwrap();
    let artifact_dir = TempDir::new().unwrap();
    fs::write(input_dir.path().join("a.txt"), "Short document about apples and orchards.").unwrap();
    fs::write(input_dir.path().join("b.txt"), "Short document about rivers and watersheds.").unwrap();

    let pipeline = Arc::new(build_pipeline(artifact_dir.path()));
    let input_source = Arc::new(InputSourceImpl::Directory(ingest_core::DirectoryInputSource::new(input_dir.path())));
    let artifact_store = Arc::new(ArtifactStoreImpl::Local(LocalArtifactStore::new(artifact_dir.path())));
    let vector_store = pipeline.vector_store.clone();
    let (_handle, cancel) = CancelHandle::new();

    let runner = PipelineRunner {
        input_source,
        artifact_store,
        vector_store,
        pipeline,
        limits: Default::default(),
        cancel,
    };

    let status = runner.run(Action::Add).await.unwrap();
    assert_eq!(status.results.len(), 2);
    assert_eq!(status.failed, 0);
    assert_eq!(status.succeeded, 2);
}
