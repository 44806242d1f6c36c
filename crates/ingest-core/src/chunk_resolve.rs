//! Wraps [`doc_chunker::chunk_document`]'s raw output with table/figure
//! association (§4.1 "Table/figure association"): after chunking, each
//! chunk scans its own text for `id="<table_id>"` / `id="<figure_id>"`
//! substrings and attaches the matching extractor objects. Purely textual,
//! so it survives any merge/overlap operation the chunker performed.

use crate::model::{ExtractedImage, ExtractedTable, TextChunk};
use doc_chunker::{ChunkerConfig, PageInput, RawChunk};
use once_cell::sync::Lazy;
use regex::Regex;

static ID_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="([^"]+)""#).unwrap());

fn referenced_ids(text: &str) -> Vec<String> {
    ID_ATTR_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Run C7 over `pages` and resolve each raw chunk's table/figure references
/// against the page's own extracted tables and figures.
pub fn chunk_and_resolve(
    pages: &[PageInput],
    page_tables: &[(usize, Vec<ExtractedTable>)],
    page_figures: &[(usize, Vec<ExtractedImage>)],
    cfg: &ChunkerConfig,
) -> Vec<TextChunk> {
    let raw = doc_chunker::chunk_document(pages, cfg);
    raw.into_iter().map(|chunk| resolve_one(chunk, page_tables, page_figures)).collect()
}

fn resolve_one(
    chunk: RawChunk,
    page_tables: &[(usize, Vec<ExtractedTable>)],
    page_figures: &[(usize, Vec<ExtractedImage>)],
) -> TextChunk {
    let ids = referenced_ids(&chunk.text);

    let tables: Vec<String> = page_tables
        .iter()
        .find(|(page_num, _)| *page_num == chunk.page_num)
        .map(|(_, tables)| {
            tables
                .iter()
                .filter(|t| ids.contains(&t.table_id))
                .map(|t| t.table_id.clone())
                .collect()
        })
        .unwrap_or_default();

    let figures: Vec<String> = page_figures
        .iter()
        .find(|(page_num, _)| *page_num == chunk.page_num)
        .map(|(_, figures)| {
            figures
                .iter()
                .filter(|f| ids.contains(&f.figure_id))
                .map(|f| f.figure_id.clone())
                .collect()
        })
        .unwrap_or_default();

    TextChunk {
        page_num: chunk.page_num,
        text: chunk.text,
        chunk_index_on_page: chunk.chunk_index_on_page,
        token_count: chunk.token_count,
        tables,
        figures,
        page_header: chunk.page_header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellKind, FigureType, TableCell};

    fn table(id: &str) -> ExtractedTable {
        ExtractedTable {
            table_id: id.to_string(),
            source_index: 0,
            pages: vec![0],
            cells: vec![TableCell { row: 0, col: 0, row_span: 1, col_span: 1, content: "x".into(), kind: CellKind::Content }],
            row_count: 1,
            col_count: 1,
            bbox: None,
            caption: None,
            rendered_text: Some("x".into()),
            summary: None,
        }
    }

    fn figure(id: &str) -> ExtractedImage {
        ExtractedImage {
            figure_id: id.to_string(),
            page_num: 0,
            bbox: [0.0, 0.0, 1.0, 1.0],
            image_bytes: Vec::new(),
            filename: "fig.png".into(),
            title: None,
            mime_type: "image/png".into(),
            figure_type: FigureType::Image,
            description: Some("a chart".into()),
            url: None,
            latex: None,
            equation_confidence: None,
        }
    }

    #[test]
    fn chunk_referencing_table_id_gets_it_attached() {
        let t = table("table_0");
        let pages = vec![PageInput {
            page_num: 0,
            text: format!(r#"intro text {}"#, t.as_figure_block()),
        }];
        let cfg = ChunkerConfig::default();
        let chunks = chunk_and_resolve(&pages, &[(0, vec![t])], &[], &cfg);
        assert!(chunks.iter().any(|c| c.tables == vec!["table_0".to_string()]));
    }

    #[test]
    fn chunk_referencing_figure_id_gets_it_attached() {
        let f = figure("fig_0");
        let pages = vec![PageInput {
            page_num: 0,
            text: format!("intro text {}", f.wrapper()),
        }];
        let cfg = ChunkerConfig::default();
        let chunks = chunk_and_resolve(&pages, &[], &[(0, vec![f])], &cfg);
        assert!(chunks.iter().any(|c| c.figures == vec!["fig_0".to_string()]));
    }
}
