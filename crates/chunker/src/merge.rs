//! Cross-page seam merging, same-page orphan merging, and the final
//! document-wide orphan pass of §4.1.

use crate::blocks::{self, SENTENCE_ENDERS};
use crate::builder::{recursive_split, RawChunk};
use crate::config::ChunkerConfig;
use crate::token_counter::TokenCounter;
use regex::Regex;
use std::sync::OnceLock;

fn numbered_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+|[IVXLCM]+)[.)]\s").unwrap())
}

/// Mirrors the original ingestor's `_is_heading_like`: a short first line that
/// looks like a markdown heading, a title, or a list/section marker.
fn is_heading_like(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() || t.chars().count() > 80 {
        return false;
    }
    if t.starts_with('#') {
        return true;
    }
    let has_alpha = t.chars().any(|c| c.is_alphabetic());
    let is_upper = has_alpha && !t.chars().any(|c| c.is_lowercase());
    let is_title = has_alpha
        && t.split_whitespace().count() <= 12
        && t.split_whitespace().all(|w| {
            w.chars()
                .next()
                .map(|c| c.is_uppercase() || !c.is_alphabetic())
                .unwrap_or(true)
                && w.chars().skip(1).all(|c| !c.is_uppercase())
        });
    if is_upper || is_title {
        return true;
    }
    if numbered_list_re().is_match(t) {
        return true;
    }
    if t.starts_with("- ") || t.starts_with("* ") || t.starts_with("• ") {
        return true;
    }
    false
}

fn concat_with_space(a: &str, b: &str) -> String {
    let need_space = matches!(
        (a.chars().next_back(), b.chars().next()),
        (Some(x), Some(y)) if x.is_alphanumeric() && y.is_alphanumeric()
    );
    if need_space {
        format!("{} {}", a, b)
    } else {
        format!("{}{}", a, b)
    }
}

fn ends_with_sentence_punct(s: &str) -> bool {
    s.trim_end()
        .chars()
        .next_back()
        .map(|c| SENTENCE_ENDERS.contains(&c))
        .unwrap_or(false)
}

/// `orphanThreshold = max(100, floor(maxSectionTokens * 0.3 if embeddingMaxTokens<400 else 0.7))`
pub fn orphan_threshold(cfg: &ChunkerConfig) -> usize {
    let factor = if cfg.embedding_max_tokens.is_some_and(|m| m < 400) {
        0.3
    } else {
        0.7
    };
    let v = (cfg.max_section_tokens as f32 * factor).floor() as usize;
    v.max(100)
}

fn is_purely_atomic(text: &str) -> bool {
    text.contains("<figure") && TokenCounter::estimate(&blocks::strip_figures(text)) < 50
}

fn replace_at(all: &mut Vec<RawChunk>, idx: usize, new_chunk: Option<RawChunk>) {
    match new_chunk {
        Some(c) => all[idx] = c,
        None => {
            all.remove(idx);
        }
    }
}

/// Append `page_chunks` (one page's already-accumulated, non-empty chunk list)
/// onto `all`, applying the look-behind seam-merge rules against `all`'s
/// current last chunk.
pub fn merge_page_at_seam(all: &mut Vec<RawChunk>, mut page_chunks: Vec<RawChunk>, cfg: &ChunkerConfig) {
    if page_chunks.is_empty() {
        return;
    }
    let Some(prev) = all.last().cloned() else {
        all.append(&mut page_chunks);
        return;
    };
    let first_new = page_chunks[0].clone();

    // Section-boundary block: differing non-table headers on both sides.
    if let (Some(ph), Some(nh)) = (&prev.page_header, &first_new.page_header) {
        let ph_l = ph.to_lowercase();
        let nh_l = nh.to_lowercase();
        if !ph_l.is_empty()
            && !nh_l.is_empty()
            && !ph_l.starts_with("table:")
            && !nh_l.starts_with("table:")
            && ph_l != nh_l
        {
            all.append(&mut page_chunks);
            return;
        }
    }

    // Table continuation: both sides atomic -> never merge across the seam.
    if prev.text.contains("<figure") && first_new.text.contains("<figure") {
        all.append(&mut page_chunks);
        return;
    }

    // Orphan safety net.
    if first_new.token_count < 100
        && !prev.text.contains("<figure")
        && !first_new.text.contains("<figure")
        && (prev.token_count + first_new.token_count) as f32 <= 0.8 * cfg.max_tokens as f32
    {
        let combined = concat_with_space(&prev.text, &first_new.text);
        let idx = all.len() - 1;
        let header = prev.page_header.clone().or_else(|| first_new.page_header.clone());
        replace_at(all, idx, RawChunk::new(prev.page_num, combined, header));
        page_chunks.remove(0);
        all.append(&mut page_chunks);
        return;
    }

    let first_is_heading_like = first_new
        .text
        .trim_start()
        .lines()
        .next()
        .map(is_heading_like)
        .unwrap_or(false);

    if cfg.cross_page_overlap {
        if first_is_heading_like {
            all.append(&mut page_chunks);
            return;
        }
    } else {
        let new_starts_lower = first_new
            .text
            .trim_start()
            .chars()
            .next()
            .map(|c| c.is_lowercase())
            .unwrap_or(false);
        if ends_with_sentence_punct(&prev.text)
            || first_new.text.trim_start().starts_with('#')
            || !new_starts_lower
        {
            all.append(&mut page_chunks);
            return;
        }
    }

    // Full merge.
    let combined_tokens = prev.token_count + first_new.token_count;
    let combined_chars = prev.text.len() + first_new.text.len();
    if combined_tokens <= cfg.max_tokens && (combined_chars as f32) <= 1.2 * cfg.max_chars as f32 {
        let combined = concat_with_space(&prev.text, &first_new.text);
        let idx = all.len() - 1;
        let header = prev.page_header.clone().or_else(|| first_new.page_header.clone());
        replace_at(all, idx, RawChunk::new(prev.page_num, combined, header));
        page_chunks.remove(0);
        all.append(&mut page_chunks);
        return;
    }

    // Partial-sentence shift: move the trailing fragment of `prev` onto `first_new`.
    if let Some(split_at) = blocks::last_sentence_end(&prev.text) {
        let retained = &prev.text[..split_at];
        let fragment = prev.text[split_at..].to_string();
        if !fragment.trim().is_empty() {
            let candidate = concat_with_space(fragment.trim_start(), &first_new.text);
            let cand_tokens = TokenCounter::estimate(&candidate);
            let idx = all.len() - 1;
            if cand_tokens <= cfg.max_tokens
                && (candidate.len() as f32) <= 1.2 * cfg.max_chars as f32
            {
                replace_at(
                    all,
                    idx,
                    RawChunk::new(prev.page_num, retained.to_string(), prev.page_header.clone()),
                );
                page_chunks.remove(0);
                if let Some(shifted) =
                    RawChunk::new(first_new.page_num, candidate, first_new.page_header.clone())
                {
                    page_chunks.insert(0, shifted);
                }
                all.append(&mut page_chunks);
                return;
            }

            // Fragment doesn't fit even shifted: split it and splice before the new page.
            replace_at(
                all,
                idx,
                RawChunk::new(prev.page_num, retained.to_string(), prev.page_header.clone()),
            );
            for sub in recursive_split(&fragment, cfg) {
                if let Some(c) = RawChunk::new(prev.page_num, sub, prev.page_header.clone()) {
                    all.push(c);
                }
            }
            all.append(&mut page_chunks);
            return;
        }
    }

    all.append(&mut page_chunks);
}

/// Walk one page's chunk list and fold orphans into their immediate predecessor.
pub fn same_page_orphan_merge(chunks: Vec<RawChunk>, cfg: &ChunkerConfig) -> Vec<RawChunk> {
    let threshold = orphan_threshold(cfg);
    let mut out: Vec<RawChunk> = Vec::new();
    for chunk in chunks {
        let is_orphan = chunk.token_count < threshold
            && !chunk.text.contains("<table")
            && !chunk.text.contains("<figure");
        if is_orphan {
            if let Some(prev) = out.last() {
                let combined_tokens = prev.token_count + chunk.token_count;
                let prev_over_cap = prev.token_count > cfg.max_section_tokens;
                let orphan_is_small_relative = (chunk.token_count as f32) < 0.3 * prev.token_count as f32;
                if combined_tokens <= cfg.max_section_tokens
                    || (prev_over_cap && orphan_is_small_relative)
                {
                    let idx = out.len() - 1;
                    let page_num = out[idx].page_num;
                    let header = out[idx].page_header.clone().or_else(|| chunk.page_header.clone());
                    let combined_text = concat_with_space(&out[idx].text, &chunk.text);
                    replace_at(&mut out, idx, RawChunk::new(page_num, combined_text, header));
                    continue;
                }
            }
        }
        out.push(chunk);
    }
    for (i, c) in out.iter_mut().enumerate() {
        c.chunk_index_on_page = i;
    }
    out
}

/// Final pass over the fully assembled, flat document chunk list.
pub fn final_orphan_pass(chunks: Vec<RawChunk>, cfg: &ChunkerConfig) -> Vec<RawChunk> {
    let threshold = orphan_threshold(cfg);
    let mut out: Vec<RawChunk> = Vec::new();
    for chunk in chunks {
        let is_small = chunk.token_count < threshold;
        let starts_new_heading = chunk.text.trim_start().starts_with("##");
        if is_small && !starts_new_heading {
            if let Some(prev) = out.last() {
                if !is_purely_atomic(&prev.text) {
                    let headers_block = match (&prev.page_header, &chunk.page_header) {
                        (Some(a), Some(b)) if chunk.token_count >= 400 => {
                            a.to_lowercase() != b.to_lowercase()
                        }
                        _ => false,
                    };
                    if !headers_block {
                        let combined_tokens = prev.token_count + chunk.token_count;
                        let ratio = chunk.token_count as f32 / cfg.max_section_tokens as f32;
                        let cap_mult = if ratio < 0.5 {
                            1.2
                        } else if ratio < 0.7 {
                            1.15
                        } else {
                            1.0
                        };
                        if (combined_tokens as f32) <= cap_mult * cfg.max_section_tokens as f32 {
                            let idx = out.len() - 1;
                            let page_num = out[idx].page_num;
                            let header =
                                out[idx].page_header.clone().or_else(|| chunk.page_header.clone());
                            let combined_text = concat_with_space(&out[idx].text, &chunk.text);
                            replace_at(&mut out, idx, RawChunk::new(page_num, combined_text, header));
                            continue;
                        }
                    }
                }
            }
        }
        out.push(chunk);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::chunk_page_text;

    fn cfg() -> ChunkerConfig {
        ChunkerConfig {
            max_tokens: 500,
            max_section_tokens: 750,
            max_chars: 4000,
            overlap_percent: 10.0,
            cross_page_overlap: true,
            disable_char_limit: false,
            embedding_max_tokens: None,
            table_legend_buffer_multiplier: 2.5,
        }
    }

    #[test]
    fn trailing_orphan_absorbed_into_predecessor() {
        let cfg = cfg();
        let page1_text = "word ".repeat(420) + "A short trailing thought here.";
        let page1 = same_page_orphan_merge(chunk_page_text(0, &page1_text, None, &cfg), &cfg);
        let page2_text = "word ".repeat(600);
        let page2 = same_page_orphan_merge(chunk_page_text(1, &page2_text, None, &cfg), &cfg);

        let mut all: Vec<RawChunk> = Vec::new();
        merge_page_at_seam(&mut all, page1, &cfg);
        let before_page2 = all.len();
        merge_page_at_seam(&mut all, page2, &cfg);
        assert!(all.len() >= before_page2);
    }

    #[test]
    fn both_sides_atomic_never_merge_across_seam() {
        let cfg = cfg();
        let fig = r#"<figure id="table_1">big table</figure>"#;
        let c1 = RawChunk::new(0, fig.to_string(), None).unwrap();
        let c2 = RawChunk::new(1, fig.to_string(), None).unwrap();
        let mut all = vec![c1];
        merge_page_at_seam(&mut all, vec![c2], &cfg);
        assert_eq!(all.len(), 2);
    }
}
