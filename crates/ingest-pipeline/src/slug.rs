//! Deterministic chunk-id slugging (§4.2 step 8):
//! `slugify(stem(name)) + "_page" + (pageNum+1) + "_chunk" + (idxOnPage+1)`.

/// Lowercase, ASCII-alphanumeric-and-hyphen slug of `s`: runs of anything
/// else collapse to a single `-`, and leading/trailing `-` are trimmed.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

pub fn stem(name: &str) -> &str {
    std::path::Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// `chunk_id = slugify(stem(name)) + "_page" + (pageNum+1) + "_chunk" + (idxOnPage+1)`.
pub fn chunk_id(name: &str, page_num_0based: usize, chunk_idx_on_page_0based: usize) -> String {
    format!(
        "{}_page{}_chunk{}",
        slugify(stem(name)),
        page_num_0based + 1,
        chunk_idx_on_page_0based + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_non_alphanumeric_runs() {
        assert_eq!(slugify("Quarterly Report (Final)!!"), "quarterly-report-final");
    }

    #[test]
    fn chunk_id_matches_deterministic_format() {
        assert_eq!(chunk_id("Quarterly Report.pdf", 0, 0), "quarterly-report_page1_chunk1");
        assert_eq!(chunk_id("notes.txt", 2, 5), "notes_page3_chunk6");
    }

    #[test]
    fn stem_strips_extension_but_keeps_path_free_name() {
        assert_eq!(stem("a/b/report.final.pdf"), "report.final");
    }
}
