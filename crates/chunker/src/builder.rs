//! The per-page accumulation engine: walks text/figure blocks with a running
//! token budget, force-appending atomic figure blocks and sentence-splitting
//! oversized text blocks.

use crate::blocks::{self, Block, BlockKind};
use crate::config::ChunkerConfig;
use crate::token_counter::TokenCounter;
use regex::Regex;
use std::sync::OnceLock;

/// An absolute ceiling past which a force-appended atomic block earns a loud warning.
const ABSOLUTE_FIGURE_CEILING: usize = 8000;

/// A table-reference floor: the remainder of the builder must still hold this
/// many tokens for the relocation in rule 4(a) to be worth doing.
const TABLE_REF_FLOOR_TOKENS: usize = 300;
const TABLE_REF_PROXIMITY_CHARS: usize = 150;

#[derive(Debug, Clone)]
pub struct RawChunk {
    pub page_num: usize,
    pub chunk_index_on_page: usize,
    pub text: String,
    pub token_count: usize,
    pub page_header: Option<String>,
}

impl RawChunk {
    pub(crate) fn new(page_num: usize, text: String, header: Option<String>) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let token_count = TokenCounter::estimate(trimmed);
        Some(Self {
            page_num,
            chunk_index_on_page: 0,
            text: trimmed.to_string(),
            token_count,
            page_header: header,
        })
    }
}

struct ChunkBuilder {
    parts: Vec<String>,
    token_len: usize,
}

impl ChunkBuilder {
    fn new() -> Self {
        Self {
            parts: Vec::new(),
            token_len: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn text(&self) -> String {
        self.parts.concat()
    }

    fn char_len(&self) -> usize {
        self.parts.iter().map(|s| s.len()).sum()
    }

    fn append(&mut self, span: &str, toks: usize) {
        self.parts.push(span.to_string());
        self.token_len += toks;
    }

    fn replace_text(&mut self, new_text: String) {
        self.token_len = TokenCounter::estimate(&new_text);
        self.parts = vec![new_text];
    }

    fn can_fit(&self, span: &str, span_toks: usize, cfg: &ChunkerConfig) -> bool {
        if self.is_empty() {
            return span_toks <= cfg.max_section_tokens;
        }
        let new_total = self.token_len + span_toks;
        if new_total > cfg.max_section_tokens {
            return false;
        }
        if !cfg.disable_char_limit {
            let new_chars = self.char_len() + span.len();
            if new_chars > cfg.max_chars {
                return false;
            }
        }
        true
    }

    fn flush(&mut self, page_num: usize, header: Option<String>) -> Option<RawChunk> {
        let text = self.text();
        self.parts.clear();
        self.token_len = 0;
        RawChunk::new(page_num, text, header)
    }
}

fn table_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\(Table\s+\d+[-\u{2013}]\d+[^)]{0,120}\)").unwrap())
}

/// Rule 4(a): if the builder's tail holds a sentence referencing a table by
/// number, within `TABLE_REF_PROXIMITY_CHARS` of the end, and the remainder
/// would still hold `TABLE_REF_FLOOR_TOKENS` tokens, pull that sentence out of
/// the builder and hand it back so the caller can prepend it to the figure.
fn relocate_table_reference(builder: &mut ChunkBuilder) -> Option<String> {
    if builder.is_empty() {
        return None;
    }
    let full = builder.text();
    let window_start = full
        .char_indices()
        .rev()
        .nth(TABLE_REF_PROXIMITY_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window = &full[window_start..];
    let m = table_ref_re().find(window)?;
    let match_start = window_start + m.start();
    let match_end = window_start + m.end();
    let remainder = format!("{}{}", &full[..match_start], &full[match_end..]);
    if TokenCounter::estimate(&remainder) < TABLE_REF_FLOOR_TOKENS && !remainder.trim().is_empty()
    {
        return None;
    }
    let fragment = full[match_start..match_end].to_string();
    builder.replace_text(remainder);
    Some(fragment)
}

fn nearest_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

use crate::blocks::SENTENCE_ENDERS;

fn find_split_position(text: &str) -> usize {
    let mid = nearest_char_boundary(text, text.len() / 2);
    let max_scan = text.len() / 2 + 1;

    for delta in 0..=max_scan {
        for candidate in [mid.checked_sub(delta), mid.checked_add(delta)] {
            let Some(p) = candidate else { continue };
            if p == 0 || p >= text.len() || !text.is_char_boundary(p) {
                continue;
            }
            if let Some(c) = text[..p].chars().next_back() {
                if SENTENCE_ENDERS.contains(&c) {
                    return p;
                }
            }
        }
    }
    for delta in 0..=max_scan {
        for candidate in [mid.checked_sub(delta), mid.checked_add(delta)] {
            let Some(p) = candidate else { continue };
            if p == 0 || p >= text.len() || !text.is_char_boundary(p) {
                continue;
            }
            if let Some(c) = text[p..].chars().next() {
                if c.is_whitespace() {
                    return p;
                }
            }
        }
    }
    mid
}

fn overlap_char_budget(cfg: &ChunkerConfig) -> usize {
    let overlap_tokens = (cfg.overlap_percent / 100.0 * cfg.max_tokens as f32).round() as usize;
    overlap_tokens * 4 // chars-per-token, matching the token counter's Latin ratio
}

/// Recursively split `text` (known to exceed the token cap) into sub-spans
/// that each fit, preserving the progress invariant.
pub fn recursive_split(text: &str, cfg: &ChunkerConfig) -> Vec<String> {
    let toks = TokenCounter::estimate(text);
    if toks <= cfg.max_tokens {
        return vec![text.to_string()];
    }
    if text.chars().count() < 100 {
        tracing::warn!(
            chars = text.chars().count(),
            "oversized span below 100 chars could not be split further; emitting as-is"
        );
        return vec![text.to_string()];
    }

    let split_pos = find_split_position(text);
    let overlap = overlap_char_budget(cfg).min(split_pos).min(text.len() - split_pos);

    let left_end = split_pos;
    let right_start = split_pos.saturating_sub(overlap);
    let right_start = nearest_char_boundary(text, right_start);

    if left_end == 0 || left_end >= text.len() || right_start >= text.len() {
        tracing::warn!("non-progressing split detected; emitting span as-is");
        return vec![text.to_string()];
    }

    let left = &text[..left_end];
    let right = &text[right_start..];
    if left.len() >= text.len() || right.len() >= text.len() {
        tracing::warn!("non-progressing split detected; emitting span as-is");
        return vec![text.to_string()];
    }

    let mut out = recursive_split(left, cfg);
    out.extend(recursive_split(right, cfg));
    out
}

/// Walk one page's blocks and accumulate them into chunks per §4.1 steps 3-5.
/// `text` must already have the page header markers stripped (run
/// [`crate::header::extract_header`] first).
pub fn chunk_page_text(
    page_num: usize,
    text: &str,
    header: Option<&str>,
    cfg: &ChunkerConfig,
) -> Vec<RawChunk> {
    let blocks: Vec<Block> = blocks::split_blocks(text);
    let header_owned = header.map(|s| s.to_string());
    let mut chunks = Vec::new();
    let mut builder = ChunkBuilder::new();
    let mut i = 0usize;

    while i < blocks.len() {
        let block = &blocks[i];
        match block.kind {
            BlockKind::Figure => {
                let prefix = relocate_table_reference(&mut builder);
                let figure_text = if let Some(prefix) = prefix {
                    format!("{}{}", prefix, block.text)
                } else {
                    block.text.clone()
                };
                let ftoks = TokenCounter::estimate(&figure_text);
                if ftoks > ABSOLUTE_FIGURE_CEILING {
                    tracing::warn!(
                        tokens = ftoks,
                        page = page_num,
                        "atomic figure block exceeds absolute ceiling; emitting whole"
                    );
                }
                builder.append(&figure_text, ftoks);

                // (c) look ahead one block for the legend-buffer rule.
                if i + 1 < blocks.len() && blocks[i + 1].kind == BlockKind::Text {
                    let next_toks = TokenCounter::estimate(&blocks[i + 1].text);
                    let buffer_cap =
                        (cfg.max_tokens as f32 * cfg.table_legend_buffer_multiplier) as usize;
                    if builder.token_len + next_toks <= buffer_cap {
                        builder.append(&blocks[i + 1].text, next_toks);
                        i += 1;
                    }
                }
                if let Some(c) = builder.flush(page_num, header_owned.clone()) {
                    chunks.push(c);
                }
            }
            BlockKind::Text => {
                for span in blocks::split_sentences(&block.text) {
                    let span_toks = TokenCounter::estimate(&span);
                    if span_toks > cfg.max_tokens {
                        if builder.token_len >= 300
                            || span_toks as f32 >= 1.5 * cfg.max_tokens as f32
                        {
                            if let Some(c) = builder.flush(page_num, header_owned.clone()) {
                                chunks.push(c);
                            }
                        }
                        for sub in recursive_split(&span, cfg) {
                            if let Some(c) = RawChunk::new(page_num, sub, header_owned.clone()) {
                                chunks.push(c);
                            }
                        }
                        continue;
                    }

                    if builder.can_fit(&span, span_toks, cfg) {
                        builder.append(&span, span_toks);
                    } else if builder.token_len < cfg.max_tokens
                        && builder.token_len + span_toks <= cfg.max_section_tokens
                    {
                        // under-target rescue: force-append rather than emit a tiny chunk.
                        builder.append(&span, span_toks);
                    } else {
                        if let Some(c) = builder.flush(page_num, header_owned.clone()) {
                            chunks.push(c);
                        }
                        if builder.can_fit(&span, span_toks, cfg) {
                            builder.append(&span, span_toks);
                        } else if let Some(c) =
                            RawChunk::new(page_num, span.clone(), header_owned.clone())
                        {
                            chunks.push(c);
                        }
                    }
                }
            }
        }
        i += 1;
    }

    if let Some(c) = builder.flush(page_num, header_owned) {
        chunks.push(c);
    }

    for (idx, c) in chunks.iter_mut().enumerate() {
        c.chunk_index_on_page = idx;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn single_span_page_never_produces_zero_chunks() {
        let chunks = chunk_page_text(0, "A short page.", None, &cfg());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn figure_block_is_never_split() {
        let long_body = "x".repeat(6000);
        let text = format!(r#"intro. <figure id="table_7">{}</figure> outro."#, long_body);
        let chunks = chunk_page_text(0, &text, None, &cfg());
        let with_figure: Vec<_> = chunks.iter().filter(|c| c.text.contains("<figure")).collect();
        assert_eq!(with_figure.len(), 1);
        assert!(with_figure[0].text.contains("</figure>"));
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let chunks = chunk_page_text(0, "", None, &cfg());
        assert!(chunks.is_empty());
    }

    #[test]
    fn recursive_split_always_progresses() {
        let text = "word ".repeat(2000);
        let cfg = cfg();
        let parts = recursive_split(&text, &cfg);
        assert!(parts.len() > 1);
        for p in &parts {
            assert!(p.len() < text.len());
        }
    }
}
