//! Layout-aware, token-bounded document chunking (component C7 of the
//! ingestion pipeline), plus the cheap token counter it's built on (C1) and
//! the page-header extractor it calls inline (C14).
//!
//! The chunker is pure: it never touches the network or the filesystem, and
//! it never fails a document — oversized or unsplittable spans are emitted
//! as-is with a `tracing::warn!`, never dropped.
//!
//! Callers pass in page text that already has figure/table placeholders
//! replaced by `<figure id="…">…</figure>` wrappers (that substitution needs
//! the figure/table objects themselves, which live one layer up in
//! `ingest-core`'s domain model). What's left here is everything from header
//! extraction onward: block splitting, accumulation, cross-page merging,
//! orphan merging, and overlap.

pub mod blocks;
pub mod builder;
pub mod config;
pub mod header;
pub mod merge;
pub mod overlap;
pub mod token_counter;

pub use builder::RawChunk;
pub use config::ChunkerConfig;
pub use token_counter::TokenCounter;

/// One page of input to the chunker: text with figure/table placeholders
/// already expanded into `<figure>` wrappers, but header/footer/page-number
/// comment markers still present (the chunker strips those itself, via C14).
#[derive(Debug, Clone)]
pub struct PageInput {
    pub page_num: usize,
    pub text: String,
}

/// Chunk an entire document's pages, applying every pass in §4.1 in order:
/// per-page accumulation, same-page orphan merge, cross-page seam merge,
/// intra-page overlap, cross-page overlap, and the final document-wide
/// orphan pass.
pub fn chunk_document(pages: &[PageInput], cfg: &ChunkerConfig) -> Vec<RawChunk> {
    let cfg = cfg.adjusted();
    let mut all: Vec<RawChunk> = Vec::new();

    for page in pages {
        let header::HeaderResult {
            cleaned_text,
            page_header,
        } = header::extract_header(&page.text);

        let raw = builder::chunk_page_text(page.page_num, &cleaned_text, page_header.as_deref(), &cfg);
        if raw.is_empty() {
            continue;
        }

        let len_before = all.len();
        merge::merge_page_at_seam(&mut all, raw, &cfg);

        // The seam merge may have absorbed this page's first chunk into the
        // previous page's last one (or shifted a trailing fragment onto it);
        // whatever remains of this page's own chunks sits at the tail of
        // `all`, starting at `len_before`. Same-page orphan merge and
        // intra-page overlap must see only that, not the already-settled
        // seam.
        let mut page_chunks = all.split_off(len_before);
        page_chunks = merge::same_page_orphan_merge(page_chunks, &cfg);
        overlap::apply_intra_page_overlap(&mut page_chunks, &cfg);
        all.extend(page_chunks);

        if all.len() > len_before {
            overlap::apply_cross_page_overlap(&mut all, len_before, &cfg);
        }
    }

    merge::final_orphan_pass(all, &cfg)
}
