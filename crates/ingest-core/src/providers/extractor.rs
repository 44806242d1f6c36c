//! Default `Extractor` implementations (§6.5): `PlainText` for `.txt`/`.md`,
//! `Office` for best-effort PDF/DOCX/PPTX/DOC.

use crate::capability::Extractor;
use crate::model::ExtractedPage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// The trivial extractor for plain-text sources: the whole file is page 0.
pub struct PlainTextExtractor;

fn extract_plain_text(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
    let (text, _encoding) = crate::encoding::decode_to_utf8(bytes);
    Ok(vec![ExtractedPage {
        page_num: 0,
        text,
        tables: Vec::new(),
        figures: Vec::new(),
        hyperlinks: Vec::new(),
        offset: 0,
    }])
}

/// Best-effort PDF/DOCX/PPTX/DOC extraction. `.doc` has no pure-Rust reader
/// available to this crate; it is read as lossy text via `encoding_rs` with a
/// logged warning — a documented limitation, not a silent gap.
pub struct OfficeExtractor;

fn extract_pdf(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
    let text = pdf_extract::extract_text_from_mem(bytes).context("pdf_extract failed")?;
    // pdf_extract does not expose per-page boundaries; consult lopdf for the
    // page count so we can at least report a single logical page honestly
    // when pagination can't be recovered, per §4.7's non-paginated fallback.
    let page_count = lopdf::Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len())
        .unwrap_or(1)
        .max(1);
    if page_count <= 1 {
        return Ok(vec![ExtractedPage {
            page_num: 0,
            text,
            tables: Vec::new(),
            figures: Vec::new(),
            hyperlinks: Vec::new(),
            offset: 0,
        }]);
    }
    // No reliable per-page split from pdf_extract's flat string; fall back to
    // an even split across the reported page count rather than guessing at
    // page-break markers that may not exist in the extracted text.
    let chars: Vec<char> = text.chars().collect();
    let chunk_len = chars.len().div_ceil(page_count).max(1);
    let mut pages = Vec::with_capacity(page_count);
    let mut offset = 0;
    for (page_num, chunk) in chars.chunks(chunk_len).enumerate() {
        let page_text: String = chunk.iter().collect();
        let len = page_text.len();
        pages.push(ExtractedPage {
            page_num,
            text: page_text,
            tables: Vec::new(),
            figures: Vec::new(),
            hyperlinks: Vec::new(),
            offset,
        });
        offset += len;
    }
    Ok(pages)
}

fn extract_docx(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
    let text = docx_lite::extract_text(bytes).context("docx_lite extraction failed")?;
    Ok(vec![ExtractedPage {
        page_num: 0,
        text,
        tables: Vec::new(),
        figures: Vec::new(),
        hyperlinks: Vec::new(),
        offset: 0,
    }])
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
    use pptx_to_md::{ParserConfig, PptxContainer};

    let config = ParserConfig::default()
        .extract_images(false)
        .include_slide_comment(true)
        .build();
    let container = PptxContainer::new(bytes, config).context("failed to open pptx container")?;
    let slides = container.parse_all().context("failed to parse pptx slides")?;

    let mut pages = Vec::with_capacity(slides.len());
    let mut offset = 0;
    for (idx, slide) in slides.into_iter().enumerate() {
        let text = slide.convert_to_md();
        let len = text.len();
        pages.push(ExtractedPage {
            page_num: idx,
            text,
            tables: Vec::new(),
            figures: Vec::new(),
            hyperlinks: Vec::new(),
            offset,
        });
        offset += len;
    }
    Ok(pages)
}

fn extract_doc_legacy(bytes: &[u8]) -> Result<Vec<ExtractedPage>> {
    tracing::warn!("extracting .doc via lossy best-effort decode, no pure-Rust binary .doc reader is available");
    let (text, _encoding) = crate::encoding::decode_to_utf8(bytes);
    let cleaned: String = text.chars().filter(|c| !c.is_control() || *c == '\n').collect();
    Ok(vec![ExtractedPage {
        page_num: 0,
        text: cleaned,
        tables: Vec::new(),
        figures: Vec::new(),
        hyperlinks: Vec::new(),
        offset: 0,
    }])
}

/// Tagged enum over every built-in `Extractor`. `Auto` dispatches on file
/// extension and is the variant the default pipeline configuration uses.
pub enum ExtractorImpl {
    PlainText(PlainTextExtractor),
    Office(OfficeExtractor),
    Auto,
}

#[async_trait]
impl Extractor for ExtractorImpl {
    async fn extract(&self, bytes: &[u8], filename: &str, _process_figures: bool) -> Result<Vec<ExtractedPage>> {
        let bytes = bytes.to_vec();
        let filename = filename.to_string();
        match self {
            ExtractorImpl::PlainText(_) => {
                tokio::task::spawn_blocking(move || extract_plain_text(&bytes)).await?
            }
            ExtractorImpl::Office(_) => tokio::task::spawn_blocking(move || extract_office(&bytes, &filename)).await?,
            ExtractorImpl::Auto => {
                tokio::task::spawn_blocking(move || {
                    if is_plain_text_ext(&extension_of(&filename)) {
                        extract_plain_text(&bytes)
                    } else {
                        extract_office(&bytes, &filename)
                    }
                })
                .await?
            }
        }
    }

    fn is_paginated(&self, filename: &str) -> bool {
        extension_of(filename) == "pdf"
    }

    fn is_presentation(&self, filename: &str) -> bool {
        extension_of(filename) == "pptx"
    }
}

fn is_plain_text_ext(ext: &str) -> bool {
    matches!(ext, "txt" | "md")
}

fn extract_office(bytes: &[u8], filename: &str) -> Result<Vec<ExtractedPage>> {
    match extension_of(filename).as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "pptx" => extract_pptx(bytes),
        "doc" => extract_doc_legacy(bytes),
        ext => anyhow::bail!("unsupported office extension: {ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_text_is_a_single_page() {
        let extractor = ExtractorImpl::PlainText(PlainTextExtractor);
        let pages = extractor.extract(b"hello world", "notes.txt", false).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "hello world");
    }

    #[test]
    fn pdf_is_paginated_pptx_is_presentation() {
        let extractor = ExtractorImpl::Auto;
        assert!(extractor.is_paginated("report.pdf"));
        assert!(!extractor.is_paginated("deck.pptx"));
        assert!(extractor.is_presentation("deck.pptx"));
        assert!(!extractor.is_presentation("report.pdf"));
    }
}
