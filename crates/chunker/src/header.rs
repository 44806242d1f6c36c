//! C14 — header extraction.
//!
//! Derives a human-readable section title from page markup, with three layered
//! fallbacks, and strips the page/header/footer comment markers the extractor
//! leaves behind regardless of which fallback (if any) produced a title.

use regex::Regex;
use std::sync::OnceLock;

fn page_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<!--\s*PageHeader="([^"]*)"\s*-->"#).unwrap())
}

fn page_footer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<!--\s*PageFooter="([^"]*)"\s*-->"#).unwrap())
}

fn page_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<!--\s*PageNumber="([^"]*)"\s*-->"#).unwrap())
}

fn chapter_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z]+-\d+\s+").unwrap())
}

fn markdown_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,3})\s+(.+)$").unwrap())
}

fn table_caption_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Table\s+\d+(?:-\d+)?\s*[:.]?\s*(.+)").unwrap())
}

fn figure_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<figure[^>]*>(.*?)</figure>").unwrap())
}

/// Collapse a duplicated phrase: "Revenue Growth revenue growth" -> "Revenue Growth".
/// Word-level, case-insensitive comparison; the returned text keeps the first half's casing.
fn collapse_duplication(s: &str) -> String {
    let trimmed = s.trim();
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() >= 2 && words.len() % 2 == 0 {
        let half = words.len() / 2;
        let first_half = words[..half].join(" ");
        let second_half = words[half..].join(" ");
        if first_half.to_lowercase() == second_half.to_lowercase() {
            return first_half;
        }
    }
    trimmed.to_string()
}

fn clean_header_candidate(raw: &str) -> String {
    let stripped = chapter_prefix_re().replace(raw, "");
    collapse_duplication(&stripped)
}

/// Result of running the header extractor over one page of raw text.
pub struct HeaderResult {
    pub cleaned_text: String,
    pub page_header: Option<String>,
}

/// Extract a page header and return the text with all page/header/footer
/// comment markers stripped, per §4.5.
pub fn extract_header(raw_text: &str) -> HeaderResult {
    let page_header = find_header(raw_text);
    let cleaned_text = strip_markers(raw_text);
    HeaderResult {
        cleaned_text,
        page_header,
    }
}

fn find_header(text: &str) -> Option<String> {
    // 1. explicit PageHeader markers, deduplicated case-insensitively and joined.
    let mut seen_lower = Vec::new();
    let mut headers = Vec::new();
    for cap in page_header_re().captures_iter(text) {
        let cleaned = clean_header_candidate(&cap[1]);
        if cleaned.is_empty() {
            continue;
        }
        let lower = cleaned.to_lowercase();
        if !seen_lower.contains(&lower) {
            seen_lower.push(lower);
            headers.push(cleaned);
        }
    }
    if !headers.is_empty() {
        return Some(headers.join(" | "));
    }

    // 2. markdown headers over the cleaned text (markers not yet stripped is fine,
    // they don't start with '#').
    for cap in markdown_header_re().captures_iter(text) {
        let candidate = cap[2].trim();
        if candidate.chars().count() >= 10 {
            return Some(candidate.to_string());
        }
    }

    // 3. table captions inside <figure> blocks.
    for fig in figure_block_re().captures_iter(text) {
        let body = &fig[1];
        if let Some(cap) = table_caption_re().captures(body) {
            let candidate = cap[1].trim();
            if candidate.chars().count() >= 10 {
                return Some(format!("Table: {}", candidate));
            }
        }
    }

    None
}

fn strip_markers(text: &str) -> String {
    let text = page_header_re().replace_all(text, "");
    let text = page_footer_re().replace_all(&text, "");
    let text = page_number_re().replace_all(&text, "");
    text.into_owned()
}
