//! Intra-page and cross-page overlap: extend the predecessor chunk with a
//! token-sized prefix of its successor, located via binary search over
//! character length and then snapped to a sentence or word boundary.

use crate::blocks::SENTENCE_ENDERS;
use crate::builder::RawChunk;
use crate::config::ChunkerConfig;
use crate::token_counter::TokenCounter;

const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

fn nearest_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn target_overlap_tokens(cfg: &ChunkerConfig) -> usize {
    (cfg.overlap_percent / 100.0 * cfg.max_tokens as f32).round() as usize
}

/// Binary search over prefix byte-length for the shortest prefix whose token
/// count is within ±2 of `target`.
fn binary_search_prefix_len(text: &str, target: usize) -> usize {
    let mut lo = 0usize;
    let mut hi = text.len();
    let mut best = hi;
    while lo < hi {
        let mid = nearest_char_boundary(text, lo + (hi - lo) / 2);
        if mid == lo {
            break;
        }
        let toks = TokenCounter::estimate(&text[..mid]);
        if toks.abs_diff(target) <= 2 {
            return mid;
        }
        if toks < target {
            lo = mid;
        } else {
            hi = mid;
            best = mid;
        }
    }
    best
}

/// Compute an overlap prefix of `source` sized to `overlap_percent * max_tokens`,
/// extended to the nearest sentence or word boundary within 1.5× the target.
fn overlap_prefix(source: &str, cfg: &ChunkerConfig) -> String {
    let target = target_overlap_tokens(cfg);
    if target == 0 || source.is_empty() {
        return String::new();
    }
    let approx_len = binary_search_prefix_len(source, target).min(source.len());
    let max_len = (target as f32 * 1.5 * CHARS_PER_TOKEN_ESTIMATE as f32) as usize;
    let window_end = source.len().min(approx_len + max_len);
    let window = &source[approx_len..window_end];

    let mut end = approx_len;
    if let Some(rel) = window.find(|c: char| SENTENCE_ENDERS.contains(&c)) {
        end = approx_len + rel + window[rel..].chars().next().map(|c| c.len_utf8()).unwrap_or(0);
    } else if let Some(rel) = window.find(char::is_whitespace) {
        end = approx_len + rel;
    }
    let end = nearest_char_boundary(source, end.min(source.len()));
    source[..end].to_string()
}

fn starts_with_figure(text: &str) -> bool {
    text.trim_start().to_lowercase().starts_with("<figure")
}

/// Extend `prev` in place with a prefix of `curr`, subject to the atomicity and
/// ceiling rules; returns the (possibly unchanged) replacement for `prev`.
fn extended(prev: &RawChunk, source_text: &str, cfg: &ChunkerConfig) -> Option<RawChunk> {
    if source_text.trim().is_empty() {
        return None;
    }
    let overlap = overlap_prefix(source_text, cfg);
    if overlap.trim().is_empty() {
        return None;
    }
    let combined_tokens = prev.token_count + TokenCounter::estimate(&overlap);
    if combined_tokens > cfg.max_section_tokens {
        return None;
    }
    let new_text = format!("{}{}", prev.text, overlap);
    RawChunk::new(prev.page_num, new_text, prev.page_header.clone())
}

/// Apply intra-page overlap across one page's already-merged chunk list.
pub fn apply_intra_page_overlap(chunks: &mut Vec<RawChunk>, cfg: &ChunkerConfig) {
    if cfg.overlap_percent <= 0.0 || chunks.len() < 2 {
        return;
    }
    for i in 1..chunks.len() {
        let curr_text = chunks[i].text.clone();
        if chunks[i - 1].text.contains("<figure") || starts_with_figure(&curr_text) {
            continue;
        }
        if let Some(new_prev) = extended(&chunks[i - 1], &curr_text, cfg) {
            chunks[i - 1] = new_prev;
        }
    }
}

/// Apply cross-page overlap at the boundary `all[boundary_idx - 1]` /
/// `all[boundary_idx]`, unconditionally (when `overlap_percent > 0`).
pub fn apply_cross_page_overlap(all: &mut [RawChunk], boundary_idx: usize, cfg: &ChunkerConfig) {
    if cfg.overlap_percent <= 0.0 || boundary_idx == 0 || boundary_idx >= all.len() {
        return;
    }
    let curr_text = all[boundary_idx].text.clone();
    let source_text = if starts_with_figure(&curr_text) {
        let lower = curr_text.to_lowercase();
        if let Some(fig_start) = lower.find("<figure") {
            let before = &curr_text[..fig_start];
            if !before.trim().is_empty() {
                before.to_string()
            } else if let Some(rel) = lower[fig_start..].find("</figure>") {
                let after = fig_start + rel + "</figure>".len();
                curr_text[after..].to_string()
            } else {
                String::new()
            }
        } else {
            curr_text.clone()
        }
    } else {
        curr_text.clone()
    };

    if let Some(new_prev) = extended(&all[boundary_idx - 1], &source_text, cfg) {
        all[boundary_idx - 1] = new_prev;
    }
}
