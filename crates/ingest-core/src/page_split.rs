//! §4.7 page splitter (C12): produce one single-page PDF per page of a
//! paginated source — load the document once, then build an independent
//! single-page writer per page. Uses `lopdf`, already part of the
//! workspace's PDF stack, rather than a second PDF-writing crate.

use anyhow::{Context, Result};
use lopdf::{Document, ObjectId};

/// One page rendered out as its own standalone PDF.
pub struct SplitPage {
    pub page_index: usize,
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
}

/// Split `pdf_bytes` into one single-page PDF per page. A page whose
/// extraction fails is logged and skipped (§7 kind 4 failure isolation); the
/// caller still receives every page that split cleanly.
pub fn split_pages(pdf_bytes: &[u8], stem: &str) -> Result<Vec<SplitPage>> {
    let doc = Document::load_mem(pdf_bytes).context("failed to parse PDF for page splitting")?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let mut out = Vec::with_capacity(page_ids.len());
    for (page_index, page_id) in page_ids.into_iter().enumerate() {
        match split_one_page(&doc, page_id) {
            Ok(bytes) => out.push(SplitPage {
                page_index,
                bytes,
                suggested_filename: format!("{stem}-page-{}.pdf", page_index + 1),
            }),
            Err(e) => {
                tracing::warn!(page_index, error = %e, "skipping page during split");
            }
        }
    }
    Ok(out)
}

fn split_one_page(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let mut single = doc.clone();
    let all_pages = single.get_pages();
    let to_delete: Vec<ObjectId> = all_pages
        .into_values()
        .filter(|&id| id != page_id)
        .collect();
    for id in to_delete {
        single.delete_object(id);
    }
    single.prune_objects();
    single.renumber_objects();
    single.compress();

    let mut buf = Vec::new();
    single
        .save_to(&mut buf)
        .context("failed to serialize single-page PDF")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A document with no recognizable page tree yields zero split pages
    /// rather than an error — the caller treats that as "not paginated".
    #[test]
    fn empty_pdf_bytes_errors_rather_than_panics() {
        let result = split_pages(b"not a pdf", "doc");
        assert!(result.is_err());
    }
}
