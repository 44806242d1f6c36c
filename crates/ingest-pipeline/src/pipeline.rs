//! §4.2 per-document pipeline (C10): extract → figures → tables → chunk →
//! embed → upload, ten sequential steps (parallel within a step where the
//! spec calls for it), never raising — every failure is captured into the
//! returned [`IngestionResult`].

use crate::config::ConcurrencyLimits;
use crate::retry::{with_embedding_retry, with_extractor_retry};
use crate::slug::chunk_id;
use ingest_core::{
    ArtifactStore, ChunkArtifact, ChunkDocument, ChunkRecord, DocumentMeta, EmbeddingsProvider,
    Extractor, IngestionResult, MediaDescriber, PageRef, TableRenderMode, VectorStore,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

pub struct DocumentPipeline<Ex, A, M, Em, V> {
    pub extractor: Arc<Ex>,
    pub offline_extractor: Option<Arc<Ex>>,
    pub artifact_store: Arc<A>,
    pub media_describer: Arc<M>,
    pub embeddings: Arc<Em>,
    pub vector_store: Arc<V>,
    pub chunker_config: doc_chunker::ChunkerConfig,
    pub limits: ConcurrencyLimits,
    pub clean_artifacts: bool,
    pub offline_fallback: bool,
    /// Process-wide provider concurrency limits (§5: "Extractor requests —
    /// across whole process — 3", "Embedding requests — across whole process
    /// — 5"). Shared across every concurrently-running document because this
    /// whole struct is constructed once and wrapped in one `Arc` by the
    /// runner, unlike `limits.documents`/`image_processing`, which are
    /// per-document-call bounds reconstructed fresh inside `process_inner`.
    pub extractor_semaphore: Arc<Semaphore>,
    pub embedding_semaphore: Arc<Semaphore>,
}

impl<Ex, A, M, Em, V> DocumentPipeline<Ex, A, M, Em, V>
where
    Ex: Extractor + 'static,
    A: ArtifactStore + 'static,
    M: MediaDescriber + 'static,
    Em: EmbeddingsProvider + 'static,
    V: VectorStore + 'static,
{
    pub async fn process(&self, name: &str, bytes: &[u8], origin_url: &str) -> IngestionResult {
        let started = Instant::now();
        match self.process_inner(name, bytes, origin_url).await {
            Ok(chunks_indexed) => IngestionResult::ok(name, chunks_indexed, started.elapsed().as_secs_f64()),
            Err(e) => {
                tracing::error!(document = name, error = %e, "document ingestion failed");
                IngestionResult::failed(name, e.to_string(), started.elapsed().as_secs_f64())
            }
        }
    }

    async fn process_inner(&self, name: &str, bytes: &[u8], origin_url: &str) -> anyhow::Result<usize> {
        // Step 0 — deletion.
        let (delete_vec, delete_artifacts) = tokio::join!(
            self.vector_store.delete_by_filename(name),
            async {
                if self.clean_artifacts && self.artifact_store.is_remote() {
                    self.artifact_store.delete_artifacts(name).await
                } else {
                    Ok(0)
                }
            }
        );
        if let Err(e) = delete_vec {
            tracing::warn!(document = name, error = %e, "pre-ingest deleteByFilename failed");
        }
        if let Err(e) = delete_artifacts {
            tracing::warn!(document = name, error = %e, "pre-ingest deleteArtifacts failed");
        }

        // Step 1 — full-document upload / storage_url resolution.
        let storage_url = if origin_url.starts_with("http://") || origin_url.starts_with("https://") {
            origin_url.to_string()
        } else if self.artifact_store.is_remote() {
            self.artifact_store.write_full_document(name, bytes).await?
        } else {
            let url = self.artifact_store.write_full_document(name, bytes).await?;
            tracing::warn!(document = name, %url, "no remote storage configured, falling back to a local file URI");
            url
        };

        // Step 2 — paginated rendering.
        let is_paginated = self.extractor.is_paginated(name);
        let mut page_pdf_urls: Vec<(usize, String)> = Vec::new();
        if is_paginated {
            if let Ok(splits) = ingest_core::split_pages(bytes, crate::slug::stem(name)) {
                for split in splits {
                    match self
                        .artifact_store
                        .write_page_rendering(name, split.page_index, &split.bytes)
                        .await
                    {
                        Ok(url) => page_pdf_urls.push((split.page_index, url)),
                        Err(e) => tracing::warn!(page = split.page_index, error = %e, "failed to upload page rendering"),
                    }
                }
            }
        }

        // Step 3 — extraction, with a single offline-fallback retry on
        // transient failure (§4.2 failure semantics).
        let extractor = self.extractor.clone();
        let bytes_owned = bytes.to_vec();
        let name_owned = name.to_string();
        let extraction = {
            let _permit = self.extractor_semaphore.acquire().await;
            with_extractor_retry(|| {
                let extractor = extractor.clone();
                let bytes = bytes_owned.clone();
                let name = name_owned.clone();
                async move { extractor.extract(&bytes, &name, true).await }
            })
            .await
        };
        let mut pages = match extraction {
            Ok(pages) => pages,
            Err(primary_err) => {
                if self.offline_fallback {
                    if let Some(offline) = &self.offline_extractor {
                        tracing::warn!(document = name, error = %primary_err, "primary extractor failed, retrying with offline extractor");
                        let _permit = self.extractor_semaphore.acquire().await;
                        offline.extract(bytes, name, true).await?
                    } else {
                        return Err(primary_err);
                    }
                } else {
                    return Err(primary_err);
                }
            }
        };

        // Step 4 — figure processing, bounded by maxImageConcurrency.
        let image_sem = Arc::new(Semaphore::new(self.limits.image_processing));
        for page in &mut pages {
            let mut tasks = Vec::new();
            for (idx, figure) in page.figures.iter().cloned().enumerate() {
                let sem = image_sem.clone();
                let describer = self.media_describer.clone();
                let store = self.artifact_store.clone();
                let doc_name = name.to_string();
                let page_num = page.page_num;
                tasks.push(tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await;
                    let mut figure = figure;
                    match describer.describe(&figure.image_bytes).await {
                        Ok(desc) => figure.description = desc,
                        Err(e) => tracing::warn!(figure = %figure.figure_id, error = %e, "media describer failed"),
                    }
                    match store
                        .write_image(&doc_name, page_num, &figure.filename, &figure.image_bytes, idx)
                        .await
                    {
                        Ok(url) => figure.url = Some(url),
                        Err(e) => tracing::warn!(figure = %figure.figure_id, error = %e, "figure upload failed"),
                    }
                    figure
                }));
            }
            let mut resolved = Vec::with_capacity(tasks.len());
            for task in tasks {
                if let Ok(figure) = task.await {
                    resolved.push(figure);
                }
            }
            page.figures = resolved;
        }

        // Step 5 — table rendering.
        for page in &mut pages {
            for table in &mut page.tables {
                table.rendered_text = Some(ingest_core::render_table(table, TableRenderMode::Markdown));
            }
        }

        // Step 6 — per-page artifact write, all concurrent.
        let mut page_write_tasks = Vec::new();
        for page in &pages {
            let store = self.artifact_store.clone();
            let doc_name = name.to_string();
            let page_num = page.page_num;
            let summary = serde_json::json!({
                "page_num": page_num,
                "tables": page.tables.iter().map(|t| &t.table_id).collect::<Vec<_>>(),
                "figures": page.figures.iter().map(|f| &f.figure_id).collect::<Vec<_>>(),
            });
            page_write_tasks.push(tokio::spawn(async move {
                if let Err(e) = store.write_page_json(&doc_name, page_num, &summary).await {
                    tracing::warn!(page = page_num, error = %e, "per-page artifact write failed");
                }
            }));
        }
        for task in page_write_tasks {
            let _ = task.await;
        }

        // Step 7 — manifest.
        let ingested_at = chrono::Utc::now().to_rfc3339();
        self.artifact_store
            .write_manifest(
                name,
                &serde_json::json!({
                    "filename": name,
                    "sourceURL": origin_url,
                    "pageCount": pages.len(),
                    "extractedAt": ingested_at,
                }),
            )
            .await?;

        // Step 8 — chunking, with figure/table wrappers substituted into page
        // text and chunk_id/sourcepage stamped per §4.2 step 8.
        let mut chunker_config = self.chunker_config.clone();
        chunker_config.embedding_max_tokens = Some(self.embeddings.max_seq_length());

        let is_presentation = self.extractor.is_presentation(name);
        let page_inputs: Vec<doc_chunker::PageInput> = pages
            .iter()
            .map(|page| doc_chunker::PageInput { page_num: page.page_num, text: wrap_figures(page) })
            .collect();
        let page_tables: Vec<_> = pages.iter().map(|p| (p.page_num, p.tables.clone())).collect();
        let page_figures: Vec<_> = pages.iter().map(|p| (p.page_num, p.figures.clone())).collect();
        let content_type = infer::get(bytes).map(|t| t.mime_type().to_string()).unwrap_or_default();
        let md5_hex = format!("{:x}", md5::compute(bytes));

        let text_chunks = ingest_core::chunk_and_resolve(&page_inputs, &page_tables, &page_figures, &chunker_config);

        let mut chunk_documents = Vec::with_capacity(text_chunks.len());
        for chunk in &text_chunks {
            let id = chunk_id(name, chunk.page_num, chunk.chunk_index_on_page);
            let sourcepage = resolve_sourcepage(name, chunk.page_num, is_paginated, is_presentation, &page_pdf_urls);
            let local_chunk_path = if self.artifact_store.is_remote() {
                None
            } else {
                self.artifact_store
                    .write_chunk_json(
                        name,
                        chunk.page_num,
                        chunk.chunk_index_on_page,
                        &serde_json::json!({ "text": chunk.text, "token_count": chunk.token_count }),
                    )
                    .await
                    .unwrap_or(None)
            };
            let figure_urls: Vec<String> = chunk
                .figures
                .iter()
                .filter_map(|fig_id| {
                    page_figures
                        .iter()
                        .find(|(p, _)| *p == chunk.page_num)
                        .and_then(|(_, figs)| figs.iter().find(|f| &f.figure_id == fig_id))
                        .and_then(|f| f.url.clone())
                })
                .collect();

            chunk_documents.push(ChunkDocument {
                document: DocumentMeta {
                    sourcefile: name.to_string(),
                    storage_url: storage_url.clone(),
                    content_type: content_type.clone(),
                    md5: md5_hex.clone(),
                    ingested_at: ingested_at.clone(),
                },
                page: PageRef {
                    page_num: chunk.page_num + 1,
                    sourcepage,
                    page_blob_url: page_pdf_urls.iter().find(|(p, _)| *p == chunk.page_num).map(|(_, u)| u.clone()),
                },
                chunk: ChunkRecord {
                    chunk_id: id,
                    chunk_index_on_page: chunk.chunk_index_on_page,
                    text: chunk.text.clone(),
                    embedding: None,
                    token_count: chunk.token_count,
                    title: chunk.page_header.clone(),
                },
                chunk_artifact: ChunkArtifact { url: local_chunk_path, local_path: None },
                table_ids: chunk.tables.clone(),
                figure_urls,
            });
        }

        // Step 9 — embedding, single batch call, order-preserving.
        let texts: Vec<String> = chunk_documents.iter().map(|d| d.chunk.text.clone()).collect();
        if !texts.is_empty() {
            let embeddings_provider = self.embeddings.clone();
            let _permit = self.embedding_semaphore.acquire().await;
            let embeddings = with_embedding_retry(|| {
                let provider = embeddings_provider.clone();
                let texts = texts.clone();
                async move { provider.embed_batch(&texts).await }
            })
            .await?;
            for (doc, vector) in chunk_documents.iter_mut().zip(embeddings.into_iter()) {
                doc.chunk.embedding = Some(vector);
            }
        }

        // Step 10 — upload, batched under maxBatchUploads. Batches are issued
        // one at a time here (the vector-store handle isn't `'static`, so a
        // JoinSet fan-out isn't available in this generic context) but the
        // semaphore still caps in-flight network calls at the configured
        // tier, matching §5's bound even without the extra parallelism.
        let include_embeddings = !self.vector_store.integrated_vectorization();
        let batch_sem = Arc::new(Semaphore::new(self.limits.batch_uploads));
        let mut uploaded = 0usize;
        const BATCH_SIZE: usize = 100;
        for batch in chunk_documents.chunks(BATCH_SIZE) {
            let _permit = batch_sem.acquire().await;
            match self.vector_store.upload(batch, include_embeddings).await {
                Ok(n) => uploaded += n,
                Err(e) => tracing::warn!(document = name, error = %e, "batch upload failed"),
            }
        }

        Ok(uploaded)
    }
}

/// Replace each table/figure's placeholder in the page's raw text with its
/// `<figure id="…">` wrapper (§4.1 step 1). Tables are rendered already by
/// the time this runs (step 5); figures carry whatever description/url step
/// 4 resolved.
fn wrap_figures(page: &ingest_core::ExtractedPage) -> String {
    let mut text = page.text.clone();
    for table in &page.tables {
        text = text.replace(&table.placeholder(), &table.as_figure_block());
    }
    for figure in &page.figures {
        text = text.replace(&figure.placeholder(), &figure.wrapper());
    }
    ingest_core::weave_hyperlinks(&text, &page.hyperlinks)
}

fn resolve_sourcepage(
    name: &str,
    page_num_0based: usize,
    is_paginated: bool,
    is_presentation: bool,
    page_pdf_urls: &[(usize, String)],
) -> String {
    let page_1based = page_num_0based + 1;
    if is_paginated {
        if let Some((_, url)) = page_pdf_urls.iter().find(|(p, _)| *p == page_num_0based) {
            return format!("{}#page={}", last_two_path_parts(url), page_1based);
        }
    }
    let basename = std::path::Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    if is_presentation {
        format!("{basename}#slide={page_1based}")
    } else {
        format!("{basename}#page={page_1based}")
    }
}

fn last_two_path_parts(url: &str) -> String {
    let parts: Vec<&str> = url.trim_end_matches('/').split('/').collect();
    if parts.len() >= 2 {
        format!("{}/{}", parts[parts.len() - 2], parts[parts.len() - 1])
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sourcepage_other_format_uses_basename_and_page() {
        let sourcepage = resolve_sourcepage("notes.txt", 0, false, false, &[]);
        assert_eq!(sourcepage, "notes.txt#page=1");
    }

    #[test]
    fn sourcepage_presentation_uses_slide() {
        let sourcepage = resolve_sourcepage("deck.pptx", 2, false, true, &[]);
        assert_eq!(sourcepage, "deck.pptx#slide=3");
    }

    #[test]
    fn sourcepage_paginated_uses_last_two_path_parts_of_cached_url() {
        let urls = vec![(0, "file:///var/artifacts/report/report_page_0001.pdf".to_string())];
        let sourcepage = resolve_sourcepage("report.pdf", 0, true, false, &urls);
        assert_eq!(sourcepage, "report/report_page_0001.pdf#page=1");
    }
}
