//! §3 data model: the types that flow between extraction, rendering,
//! chunking, and indexing for one document.

use serde::{Deserialize, Serialize};

/// A table cell's role within the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Content,
    ColumnHeader,
    RowHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
    pub content: String,
    pub kind: CellKind,
}

/// A bounding box in page coordinates: `[x0, y0, x1, y1]`.
pub type BBox = [f32; 4];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub table_id: String,
    /// Index assigned by the extractor, retained so the page-text builder can
    /// mask the exact source span this table replaces.
    pub source_index: usize,
    /// 0-based page numbers this table spans (usually length 1).
    pub pages: Vec<usize>,
    pub cells: Vec<TableCell>,
    pub row_count: usize,
    pub col_count: usize,
    pub bbox: Option<BBox>,
    pub caption: Option<String>,
    /// Set by C5 (table renderer).
    pub rendered_text: Option<String>,
    /// Set by C6 (media describer) when table summarization is enabled.
    pub summary: Option<String>,
}

impl ExtractedTable {
    /// The placeholder embedded into page text standing in for this table,
    /// Raw mask token the extractor leaves in `page.text` before rendering.
    pub fn placeholder(&self) -> String {
        format!(r#"<table id="{}"/>"#, self.table_id)
    }

    /// The `<figure>` block this table is wrapped in once C5 has rendered it
    /// (§4.1 step 1: "table renderings are already wrapped in `<figure>` by
    /// the extractor"). The chunker's block scan and every downstream
    /// `id="…"` association matches against this, not the raw placeholder.
    pub fn as_figure_block(&self) -> String {
        let rendered = self.rendered_text.as_deref().unwrap_or("");
        let body = match &self.caption {
            Some(caption) if !caption.is_empty() => format!("{}\n\n{}", caption, rendered),
            _ => rendered.to_string(),
        };
        format!(r#"<figure id="{}">{}</figure>"#, self.table_id, body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FigureType {
    Image,
    Equation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub figure_id: String,
    pub page_num: usize,
    pub bbox: BBox,
    #[serde(skip_serializing, skip_deserializing)]
    pub image_bytes: Vec<u8>,
    pub filename: String,
    pub title: Option<String>,
    pub mime_type: String,
    pub figure_type: FigureType,
    /// Set by C6 (media describer).
    pub description: Option<String>,
    /// Set by C2 (artifact store) once the image has been uploaded.
    pub url: Option<String>,
    /// Equation-only fields.
    pub latex: Option<String>,
    pub equation_confidence: Option<f32>,
}

impl ExtractedImage {
    pub fn placeholder(&self) -> String {
        format!(r#"<figure id="{}"/>"#, self.figure_id)
    }

    /// The `<figure id="…">…</figure>` wrapper the chunker expects in page
    /// text, built from whatever description/title is available (§4.1 step 1).
    pub fn wrapper(&self) -> String {
        let title_attr = self
            .title
            .as_deref()
            .map(|t| format!(r#" title="{}""#, escape_attr(t)))
            .unwrap_or_default();
        let body = self.description.as_deref().unwrap_or("");
        format!(
            r#"<figure id="{}"{}>{}</figure>"#,
            self.figure_id, title_attr, body
        )
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageHyperlink {
    pub page_num: usize,
    pub bbox: BBox,
    pub url: String,
    pub link_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub page_num: usize,
    pub text: String,
    pub tables: Vec<ExtractedTable>,
    pub figures: Vec<ExtractedImage>,
    pub hyperlinks: Vec<PageHyperlink>,
    /// Character offset of this page's text within the full extracted document,
    /// useful for citation/debugging purposes.
    pub offset: usize,
}

/// A bounded, layout-aware span produced by the chunker (C7), after table and
/// figure association has been resolved against the owning page's extracted
/// objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub page_num: usize,
    pub text: String,
    pub chunk_index_on_page: usize,
    pub token_count: usize,
    pub tables: Vec<String>,
    pub figures: Vec<String>,
    pub page_header: Option<String>,
}

impl TextChunk {
    pub fn has_tables(&self) -> bool {
        !self.tables.is_empty()
    }

    pub fn has_figures(&self) -> bool {
        !self.figures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub sourcefile: String,
    pub storage_url: String,
    pub content_type: String,
    pub md5: String,
    pub ingested_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRef {
    /// 1-based page number, matching the consumer contract (§6.4).
    pub page_num: usize,
    pub sourcepage: String,
    pub page_blob_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkArtifact {
    pub url: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub chunk_index_on_page: usize,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub token_count: usize,
    pub title: Option<String>,
}

/// What C9 (vector store) ingests: one row per chunk, fully resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub document: DocumentMeta,
    pub page: PageRef,
    pub chunk: ChunkRecord,
    pub chunk_artifact: ChunkArtifact,
    pub table_ids: Vec<String>,
    pub figure_urls: Vec<String>,
}

impl ChunkDocument {
    pub fn has_tables(&self) -> bool {
        !self.table_ids.is_empty()
    }

    pub fn has_figures(&self) -> bool {
        !self.figure_urls.is_empty()
    }
}

/// The result of processing one document through the pipeline (C10). Never
/// constructed from a raised exception — failures are captured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub sourcefile: String,
    pub success: bool,
    pub chunks_indexed: usize,
    pub error: Option<String>,
    pub seconds: f64,
}

impl IngestionResult {
    pub fn ok(sourcefile: impl Into<String>, chunks_indexed: usize, seconds: f64) -> Self {
        Self {
            sourcefile: sourcefile.into(),
            success: true,
            chunks_indexed,
            error: None,
            seconds,
        }
    }

    pub fn failed(sourcefile: impl Into<String>, error: impl Into<String>, seconds: f64) -> Self {
        Self {
            sourcefile: sourcefile.into(),
            success: false,
            chunks_indexed: 0,
            error: Some(error.into()),
            seconds,
        }
    }
}
