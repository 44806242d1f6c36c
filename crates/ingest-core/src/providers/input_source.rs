//! Default `InputSource` implementations (§6.5).

use crate::capability::{InputSource, SourceDocument};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Walks a root directory and yields every regular file under it as a
/// source document with a `file://` origin URL.
pub struct DirectoryInputSource {
    root: PathBuf,
}

impl DirectoryInputSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Tagged enum over every built-in `InputSource`. A closed, compile-time
/// dispatch in place of a runtime plugin registry — adding a backend is a
/// one-variant diff.
pub enum InputSourceImpl {
    Directory(DirectoryInputSource),
}

#[async_trait]
impl InputSource for InputSourceImpl {
    async fn list(&self) -> Result<Vec<SourceDocument>> {
        match self {
            InputSourceImpl::Directory(inner) => list_directory(&inner.root).await,
        }
    }
}

async fn list_directory(root: &std::path::Path) -> Result<Vec<SourceDocument>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut docs = Vec::new();
        for entry in walkdir::WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());
            let origin_url = format!("file://{}", path.display());
            docs.push(SourceDocument { name, bytes, origin_url });
        }
        Ok(docs)
    })
    .await
    .context("directory walk task panicked")?
}
