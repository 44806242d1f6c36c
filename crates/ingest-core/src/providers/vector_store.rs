//! Default `VectorStore` implementation: `SqliteVectorStore`, a
//! schema-in-a-const-string / WAL-mode table keyed for idempotent upsert on
//! `chunk_id`.

use crate::capability::VectorStore;
use crate::model::ChunkDocument;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    sourcefile TEXT NOT NULL,
    content TEXT NOT NULL,
    page_num INTEGER NOT NULL,
    sourcepage TEXT NOT NULL,
    storage_url TEXT,
    title TEXT,
    embedding BLOB,
    has_tables INTEGER NOT NULL DEFAULT 0,
    has_figures INTEGER NOT NULL DEFAULT 0,
    figure_urls TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_sourcefile ON chunks(sourcefile);
";

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dims: usize,
}

impl SqliteVectorStore {
    pub fn open(path: impl AsRef<Path>, dims: usize) -> Result<Self> {
        let conn = Connection::open(path).context("opening sqlite vector store")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn), dims })
    }

    pub fn open_in_memory(dims: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn), dims })
    }
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Tagged enum over every built-in `VectorStore`.
pub enum VectorStoreImpl {
    Sqlite(SqliteVectorStore),
}

#[async_trait]
impl VectorStore for VectorStoreImpl {
    async fn upload(&self, docs: &[ChunkDocument], include_embeddings: bool) -> Result<usize> {
        match self {
            VectorStoreImpl::Sqlite(store) => {
                let conn = store.conn.lock().expect("sqlite connection mutex poisoned");
                let mut count = 0;
                for doc in docs {
                    let embedding = if include_embeddings {
                        doc.chunk.embedding.as_deref().map(encode_embedding)
                    } else {
                        None
                    };
                    // §6.4: storageUrl is per-page when a page rendering was
                    // uploaded, falling back to the full-document URL.
                    let storage_url = doc
                        .page
                        .page_blob_url
                        .clone()
                        .unwrap_or_else(|| doc.document.storage_url.clone());
                    conn.execute(
                        "INSERT INTO chunks (chunk_id, sourcefile, content, page_num, sourcepage, storage_url, title, embedding, has_tables, has_figures, figure_urls, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                         ON CONFLICT(chunk_id) DO UPDATE SET
                            sourcefile = excluded.sourcefile,
                            content = excluded.content,
                            page_num = excluded.page_num,
                            sourcepage = excluded.sourcepage,
                            storage_url = excluded.storage_url,
                            title = excluded.title,
                            embedding = excluded.embedding,
                            has_tables = excluded.has_tables,
                            has_figures = excluded.has_figures,
                            figure_urls = excluded.figure_urls,
                            updated_at = excluded.updated_at",
                        params![
                            doc.chunk.chunk_id,
                            doc.document.sourcefile,
                            doc.chunk.text,
                            doc.page.page_num as i64,
                            doc.page.sourcepage,
                            storage_url,
                            doc.chunk.title,
                            embedding,
                            doc.has_tables() as i64,
                            doc.has_figures() as i64,
                            serde_json::to_string(&doc.figure_urls)?,
                            doc.document.ingested_at,
                        ],
                    )?;
                    count += 1;
                }
                Ok(count)
            }
        }
    }

    async fn delete_by_filename(&self, filename: &str) -> Result<usize> {
        match self {
            VectorStoreImpl::Sqlite(store) => {
                let conn = store.conn.lock().expect("sqlite connection mutex poisoned");
                let n = conn.execute("DELETE FROM chunks WHERE sourcefile = ?1", params![filename])?;
                Ok(n)
            }
        }
    }

    async fn delete_all(&self) -> Result<usize> {
        match self {
            VectorStoreImpl::Sqlite(store) => {
                let conn = store.conn.lock().expect("sqlite connection mutex poisoned");
                let n = conn.execute("DELETE FROM chunks", [])?;
                Ok(n)
            }
        }
    }

    fn dimensions(&self) -> usize {
        match self {
            VectorStoreImpl::Sqlite(store) => store.dims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkArtifact, ChunkRecord, DocumentMeta, PageRef};

    fn sample_doc(chunk_id: &str, sourcefile: &str) -> ChunkDocument {
        ChunkDocument {
            document: DocumentMeta {
                sourcefile: sourcefile.to_string(),
                storage_url: "file://doc".into(),
                content_type: "application/pdf".into(),
                md5: "abc".into(),
                ingested_at: "2026-07-28T00:00:00Z".into(),
            },
            page: PageRef { page_num: 1, sourcepage: "doc.pdf#page=1".into(), page_blob_url: None },
            chunk: ChunkRecord {
                chunk_id: chunk_id.to_string(),
                chunk_index_on_page: 0,
                text: "hello".into(),
                embedding: Some(vec![0.1, 0.2, 0.3]),
                token_count: 1,
                title: None,
            },
            chunk_artifact: ChunkArtifact { url: None, local_path: None },
            table_ids: Vec::new(),
            figure_urls: Vec::new(),
        }
    }

    #[tokio::test]
    async fn upload_is_idempotent_on_chunk_id() {
        let store = VectorStoreImpl::Sqlite(SqliteVectorStore::open_in_memory(3).unwrap());
        let doc = sample_doc("doc_page1_chunk1", "doc.pdf");
        assert_eq!(store.upload(&[doc.clone()], true).await.unwrap(), 1);
        assert_eq!(store.upload(&[doc], true).await.unwrap(), 1);

        if let VectorStoreImpl::Sqlite(inner) = &store {
            let conn = inner.conn.lock().unwrap();
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0)).unwrap();
            assert_eq!(count, 1);
        }
    }

    #[tokio::test]
    async fn delete_by_filename_scopes_to_that_document() {
        let store = VectorStoreImpl::Sqlite(SqliteVectorStore::open_in_memory(3).unwrap());
        store.upload(&[sample_doc("a_p1_c1", "a.pdf")], true).await.unwrap();
        store.upload(&[sample_doc("b_p1_c1", "b.pdf")], true).await.unwrap();
        let removed = store.delete_by_filename("a.pdf").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.delete_all().await.unwrap(), 1);
    }
}
