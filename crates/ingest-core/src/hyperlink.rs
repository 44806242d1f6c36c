//! §4.6 hyperlink weaver (C13): converts detected hyperlink rectangles into
//! inline markdown-style links within page text.

use crate::model::PageHyperlink;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static MARKDOWN_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").unwrap());
static PAGE_FOOTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<!--PageFooter="([^"]*)"-->"#).unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s<>\]\)]+").unwrap());
static TRAILING_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;:!?]+$").unwrap());

/// Group raw hyperlinks by URL, space-joining link text when the same URL is
/// backed by multiple rectangles (recovers a link that wraps across lines).
fn group_by_url(hyperlinks: &[PageHyperlink]) -> Vec<(String, String)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for link in hyperlinks {
        if !grouped.contains_key(&link.url) {
            order.push(link.url.clone());
        }
        grouped
            .entry(link.url.clone())
            .or_default()
            .push(link.link_text.clone());
    }
    order
        .into_iter()
        .map(|url| {
            let text = grouped.remove(&url).unwrap_or_default().join(" ");
            (url, text)
        })
        .collect()
}

/// Spans already inside an existing `[text](url)` construct, so replacements
/// never nest inside one another.
fn linked_spans(text: &str) -> Vec<(usize, usize)> {
    MARKDOWN_LINK_RE.find_iter(text).map(|m| (m.start(), m.end())).collect()
}

fn overlaps_any(start: usize, end: usize, spans: &[(usize, usize)]) -> bool {
    spans.iter().any(|&(s, e)| start < e && end > s)
}

/// Find the first occurrence of `needle` in `text` that doesn't already sit
/// inside a markdown link, trying progressively looser match rules.
fn find_unlinked_occurrence(text: &str, needle: &str, spans: &[(usize, usize)]) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let candidates: [&str; 2] = [needle.trim_matches(|c| c == '"' || c == '\''), needle];
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        if let Some(pos) = find_first_unlinked(text, candidate, spans) {
            return Some(pos);
        }
    }

    // Flexible whitespace: collapse runs of literal spaces into `\s+`.
    if needle.contains(' ') {
        let pattern = regex::escape(needle).replace(r"\ ", r"\s+");
        if let Ok(re) = Regex::new(&pattern) {
            for m in re.find_iter(text) {
                if !overlaps_any(m.start(), m.end(), spans) {
                    return Some((m.start(), m.end()));
                }
            }
        }
    }

    // Text minus trailing punctuation.
    let stripped = TRAILING_PUNCT_RE.replace(needle, "");
    if stripped != needle && !stripped.is_empty() {
        if let Some(pos) = find_first_unlinked(text, &stripped, spans) {
            return Some(pos);
        }
    }

    None
}

fn find_first_unlinked(text: &str, needle: &str, spans: &[(usize, usize)]) -> Option<(usize, usize)> {
    let mut start = 0;
    while let Some(rel) = text[start..].find(needle) {
        let s = start + rel;
        let e = s + needle.len();
        if !overlaps_any(s, e, spans) {
            return Some((s, e));
        }
        start = s + 1;
        if start >= text.len() {
            break;
        }
    }
    None
}

/// Weave `page.hyperlinks` into `page_text` as inline `[text](url)` links,
/// then recover any footer-only citation URLs that never matched visible text.
pub fn weave_hyperlinks(page_text: &str, hyperlinks: &[PageHyperlink]) -> String {
    let mut text = page_text.to_string();

    for (url, link_text) in group_by_url(hyperlinks) {
        let spans = linked_spans(&text);
        if let Some((s, e)) = find_unlinked_occurrence(&text, &link_text, &spans) {
            let replacement = format!("[{}]({})", &text[s..e], url);
            text.replace_range(s..e, &replacement);
        }
    }

    insert_footer_reference_urls(&text)
}

/// For every `<!--PageFooter="…"-->` marker containing a URL that doesn't
/// already appear in the visible text, insert a `**Reference:** <url>` line
/// immediately before the marker.
fn insert_footer_reference_urls(text: &str) -> String {
    let footer_urls: Vec<String> = PAGE_FOOTER_RE
        .captures_iter(text)
        .flat_map(|cap| {
            let footer_text = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            URL_RE.find_iter(footer_text).map(|m| m.as_str().to_string()).collect::<Vec<_>>()
        })
        .collect();
    if footer_urls.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    for url in footer_urls {
        if out.contains(&url) && out.matches(&url).count() > 1 {
            continue;
        }
        if let Some(marker_pos) = PAGE_FOOTER_RE.find(&out).map(|m| m.start()) {
            let visible_before_marker = &out[..marker_pos];
            if visible_before_marker.contains(&url) {
                continue;
            }
            let reference = format!("\n\n**Reference:** {}\n\n", url);
            out.insert_str(marker_pos, &reference);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, text: &str) -> PageHyperlink {
        PageHyperlink {
            page_num: 0,
            bbox: [0.0, 0.0, 1.0, 1.0],
            url: url.to_string(),
            link_text: text.to_string(),
        }
    }

    #[test]
    fn substitutes_first_non_linked_occurrence() {
        let text = "See our documentation for details.";
        let links = vec![link("https://example.com/docs", "documentation")];
        let woven = weave_hyperlinks(text, &links);
        assert_eq!(woven, "See our [documentation](https://example.com/docs) for details.");
    }

    #[test]
    fn does_not_replace_inside_existing_link() {
        let text = "[documentation](https://other.example) and documentation again.";
        let links = vec![link("https://example.com/docs", "documentation")];
        let woven = weave_hyperlinks(text, &links);
        assert!(woven.starts_with("[documentation](https://other.example)"));
        assert!(woven.contains("[documentation](https://example.com/docs) again."));
    }

    #[test]
    fn multi_rect_links_are_space_joined_before_matching() {
        let text = "Continued reading here more info.";
        let links = vec![
            link("https://example.com/x", "reading here"),
            link("https://example.com/x", "more info"),
        ];
        let woven = weave_hyperlinks(text, &links);
        assert!(woven.contains("[reading here more info](https://example.com/x)"));
    }

    #[test]
    fn footer_only_url_is_inserted_as_reference() {
        let text = r#"Body text with no link.<!--PageFooter="See https://example.com/cite"-->"#;
        let woven = weave_hyperlinks(text, &[]);
        assert!(woven.contains("**Reference:** https://example.com/cite"));
        assert!(woven.find("**Reference:**").unwrap() < woven.find("<!--PageFooter").unwrap());
    }

    #[test]
    fn footer_url_already_visible_is_not_duplicated() {
        let text = r#"See https://example.com/cite for more.<!--PageFooter="https://example.com/cite"-->"#;
        let woven = weave_hyperlinks(text, &[]);
        assert!(!woven.contains("**Reference:**"));
    }
}
