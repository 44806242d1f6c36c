//! §4.3 pipeline runner (C11): dispatches ADD | REMOVE | REMOVE_ALL, fans
//! out document processing under a bounded worker pool, and aggregates a
//! status manifest.

use crate::cancel::CancelSignal;
use crate::config::ConcurrencyLimits;
use crate::pipeline::DocumentPipeline;
use ingest_core::{
    ArtifactStore, EmbeddingsProvider, Extractor, IngestionResult, InputSource, MediaDescriber,
    VectorStore,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
    RemoveAll,
}

#[derive(Debug, Serialize)]
pub struct PipelineStatus {
    pub action: &'static str,
    pub started_at: String,
    pub results: Vec<IngestionResult>,
    pub succeeded: usize,
    pub failed: usize,
}

impl PipelineStatus {
    fn from_results(action: &'static str, started_at: String, results: Vec<IngestionResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        Self { action, started_at, results, succeeded, failed }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub collaborator: &'static str,
    pub ok: bool,
    pub message: Option<String>,
}

pub struct PipelineRunner<I, Ex, A, M, Em, V> {
    pub input_source: Arc<I>,
    pub artifact_store: Arc<A>,
    pub vector_store: Arc<V>,
    pub pipeline: Arc<DocumentPipeline<Ex, A, M, Em, V>>,
    pub limits: ConcurrencyLimits,
    pub cancel: CancelSignal,
}

impl<I, Ex, A, M, Em, V> PipelineRunner<I, Ex, A, M, Em, V>
where
    I: InputSource + 'static,
    Ex: Extractor + 'static,
    A: ArtifactStore + 'static,
    M: MediaDescriber + 'static,
    Em: EmbeddingsProvider + 'static,
    V: VectorStore + 'static,
{
    pub async fn run(&self, action: Action) -> anyhow::Result<PipelineStatus> {
        match action {
            Action::Add => self.run_add().await,
            Action::Remove => self.run_remove().await,
            Action::RemoveAll => self.run_remove_all().await,
        }
    }

    async fn run_add(&self) -> anyhow::Result<PipelineStatus> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let docs = self.input_source.list().await?;
        if docs.is_empty() {
            anyhow::bail!("no input documents found; nothing to ingest");
        }

        let sem = Arc::new(Semaphore::new(self.limits.documents));
        let mut tasks: JoinSet<IngestionResult> = JoinSet::new();
        let mut skipped = Vec::new();
        for doc in docs {
            if self.cancel.is_cancelled() {
                skipped.push(IngestionResult::failed(&doc.name, "skipped: run cancelled", 0.0));
                continue;
            }
            let sem = sem.clone();
            let pipeline = self.pipeline.clone();
            tasks.spawn(async move {
                let _permit = sem.acquire_owned().await;
                pipeline.process(&doc.name, &doc.bytes, &doc.origin_url).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "document task panicked"),
            }
        }
        results.extend(skipped);

        let status = PipelineStatus::from_results("ADD", started_at.clone(), results);
        self.write_status_manifest(&status, &started_at).await;
        Ok(status)
    }

    async fn run_remove(&self) -> anyhow::Result<PipelineStatus> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let docs = self.input_source.list().await?;

        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let started = std::time::Instant::now();
            let (vec_result, artifact_result) = tokio::join!(
                self.vector_store.delete_by_filename(&doc.name),
                self.artifact_store.delete_artifacts(&doc.name)
            );
            let count = vec_result.unwrap_or(0) + artifact_result.unwrap_or(0);
            results.push(IngestionResult::ok(&doc.name, count, started.elapsed().as_secs_f64()));
        }

        let status = PipelineStatus::from_results("REMOVE", started_at.clone(), results);
        self.write_status_manifest(&status, &started_at).await;
        Ok(status)
    }

    async fn run_remove_all(&self) -> anyhow::Result<PipelineStatus> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let started = std::time::Instant::now();
        let count = self.vector_store.delete_all().await?;
        let _ = self.artifact_store.delete_all().await;
        let status = PipelineStatus::from_results(
            "REMOVE_ALL",
            started_at.clone(),
            vec![IngestionResult::ok("*", count, started.elapsed().as_secs_f64())],
        );
        self.write_status_manifest(&status, &started_at).await;
        Ok(status)
    }

    /// Probes every configured collaborator without issuing destructive
    /// calls. Used by the CLI's `validate` subcommand.
    pub async fn validate(&self) -> Vec<ValidationResult> {
        let mut out = Vec::new();

        out.push(match self.input_source.list().await {
            Ok(docs) => ValidationResult { collaborator: "input_source", ok: true, message: Some(format!("{} documents discovered", docs.len())) },
            Err(e) => ValidationResult { collaborator: "input_source", ok: false, message: Some(e.to_string()) },
        });

        out.push(match self.artifact_store.ensure_ready().await {
            Ok(()) => ValidationResult { collaborator: "artifact_store", ok: true, message: None },
            Err(e) => ValidationResult { collaborator: "artifact_store", ok: false, message: Some(e.to_string()) },
        });

        out.push(ValidationResult {
            collaborator: "embeddings_provider",
            ok: true,
            message: Some(format!(
                "dims={} max_seq_length={}",
                self.pipeline.embeddings.dimensions(),
                self.pipeline.embeddings.max_seq_length()
            )),
        });

        out.push(ValidationResult {
            collaborator: "vector_store",
            ok: true,
            message: Some(format!("dims={}", self.vector_store.dimensions())),
        });

        out
    }

    async fn write_status_manifest(&self, status: &PipelineStatus, started_at: &str) {
        let timestamp = started_at.replace([':', '.'], "-");
        let name = format!("pipeline_status_{timestamp}.json");
        if let Ok(value) = serde_json::to_value(status) {
            if let Err(e) = self.artifact_store.write_status(&name, &value).await {
                tracing::warn!(error = %e, "failed to write pipeline status manifest");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_status_counts_successes_and_failures() {
        let results = vec![
            IngestionResult::ok("a.pdf", 3, 0.1),
            IngestionResult::failed("b.pdf", "boom", 0.2),
        ];
        let status = PipelineStatus::from_results("ADD", "2026-07-28T00:00:00Z".into(), results);
        assert_eq!(status.succeeded, 1);
        assert_eq!(status.failed, 1);
    }
}
