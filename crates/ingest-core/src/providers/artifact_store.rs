//! Default `ArtifactStore` implementations (§6.5), following the §6.3
//! persisted-state layout byte-for-byte.

use crate::capability::ArtifactStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes artifacts under a configured base directory, following the §6.3
/// layout. `write_full_document` is a no-op that returns the source file's
/// own `file://` URI rather than copying bytes, per §6.1.
pub struct LocalArtifactStore {
    base_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn stem_dir(&self, doc_name: &str) -> PathBuf {
        self.base_dir.join(stem(doc_name))
    }

    async fn write_json(path: PathBuf, obj: &serde_json::Value) -> Result<String> {
        let bytes = serde_json::to_vec_pretty(obj)?;
        write_file(&path, &bytes).await?;
        Ok(file_url(&path))
    }
}

fn stem(doc_name: &str) -> String {
    Path::new(doc_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| doc_name.to_string())
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// Tagged enum over every built-in `ArtifactStore`.
pub enum ArtifactStoreImpl {
    Local(LocalArtifactStore),
}

#[async_trait]
impl ArtifactStore for ArtifactStoreImpl {
    async fn write_page_json(&self, doc_name: &str, page_idx: usize, obj: &serde_json::Value) -> Result<String> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let path = store
                    .stem_dir(doc_name)
                    .join(format!("page-{:04}.json", page_idx + 1));
                LocalArtifactStore::write_json(path, obj).await
            }
        }
    }

    async fn write_page_rendering(&self, doc_name: &str, page_idx: usize, bytes: &[u8]) -> Result<String> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let path = store
                    .base_dir
                    .join(format!("{}_page_{:04}.pdf", stem(doc_name), page_idx + 1));
                write_file(&path, bytes).await?;
                Ok(file_url(&path))
            }
        }
    }

    async fn write_full_document(&self, doc_name: &str, _bytes: &[u8]) -> Result<String> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let path = store.base_dir.join(doc_name);
                Ok(file_url(&path))
            }
        }
    }

    async fn write_chunk_json(
        &self,
        doc_name: &str,
        page_idx: usize,
        chunk_idx: usize,
        obj: &serde_json::Value,
    ) -> Result<Option<String>> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let path = store
                    .stem_dir(doc_name)
                    .join(format!("page-{:04}", page_idx + 1))
                    .join(format!("chunk-{:06}.json", chunk_idx));
                Ok(Some(LocalArtifactStore::write_json(path, obj).await?))
            }
        }
    }

    async fn write_image(
        &self,
        doc_name: &str,
        page_idx: usize,
        original_name: &str,
        bytes: &[u8],
        figure_idx_on_page: usize,
    ) -> Result<String> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let ext = Path::new(original_name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_else(|| "png".to_string());
                let path = store.stem_dir(doc_name).join(format!(
                    "page_{:02}_fig_{:02}.{}",
                    page_idx + 1,
                    figure_idx_on_page + 1,
                    ext
                ));
                write_file(&path, bytes).await?;
                Ok(file_url(&path))
            }
        }
    }

    async fn write_manifest(&self, doc_name: &str, obj: &serde_json::Value) -> Result<String> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let path = store.stem_dir(doc_name).join("manifest.json");
                LocalArtifactStore::write_json(path, obj).await
            }
        }
    }

    async fn write_status(&self, name: &str, obj: &serde_json::Value) -> Result<String> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let path = store.base_dir.join("status").join(name);
                LocalArtifactStore::write_json(path, obj).await
            }
        }
    }

    async fn delete_artifacts(&self, doc_name: &str) -> Result<usize> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                let dir = store.stem_dir(doc_name);
                if !dir.exists() {
                    return Ok(0);
                }
                let count = count_files(&dir)?;
                tokio::fs::remove_dir_all(&dir).await?;
                Ok(count)
            }
        }
    }

    async fn delete_all(&self) -> Result<usize> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                if !store.base_dir.exists() {
                    return Ok(0);
                }
                let count = count_files(&store.base_dir)?;
                tokio::fs::remove_dir_all(&store.base_dir).await?;
                tokio::fs::create_dir_all(&store.base_dir).await?;
                Ok(count)
            }
        }
    }

    async fn ensure_ready(&self) -> Result<()> {
        match self {
            ArtifactStoreImpl::Local(store) => {
                tokio::fs::create_dir_all(&store.base_dir).await?;
                Ok(())
            }
        }
    }

    fn is_remote(&self) -> bool {
        false
    }
}

fn count_files(dir: &Path) -> Result<usize> {
    Ok(walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn page_json_path_follows_stem_convention() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStoreImpl::Local(LocalArtifactStore::new(dir.path()));
        let url = store
            .write_page_json("report.pdf", 0, &json!({"tables": []}))
            .await
            .unwrap();
        assert!(url.ends_with("report/page-0001.json"));
        assert!(dir.path().join("report/page-0001.json").exists());
    }

    #[tokio::test]
    async fn delete_artifacts_removes_only_that_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStoreImpl::Local(LocalArtifactStore::new(dir.path()));
        store.write_manifest("a.pdf", &json!({})).await.unwrap();
        store.write_manifest("b.pdf", &json!({})).await.unwrap();
        let removed = store.delete_artifacts("a.pdf").await.unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("b").exists());
    }

    #[tokio::test]
    async fn full_document_write_is_a_no_op_returning_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStoreImpl::Local(LocalArtifactStore::new(dir.path()));
        let url = store.write_full_document("report.pdf", b"bytes").await.unwrap();
        assert!(url.ends_with("report.pdf"));
        assert!(!dir.path().join("report.pdf").exists());
    }
}
