//! Block and sentence splitting primitives shared by the chunk builder.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Figure,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

fn figure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<figure[^>]*>.*?</figure>").unwrap())
}

/// Scan `<figure …>…</figure>` spans (case-insensitive, greedy within one figure)
/// and split `text` into an ordered sequence of `Text`/`Figure` blocks.
pub fn split_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut last_end = 0usize;
    for m in figure_re().find_iter(text) {
        if m.start() > last_end {
            blocks.push(Block {
                kind: BlockKind::Text,
                text: text[last_end..m.start()].to_string(),
            });
        }
        blocks.push(Block {
            kind: BlockKind::Figure,
            text: m.as_str().to_string(),
        });
        last_end = m.end();
    }
    if last_end < text.len() {
        blocks.push(Block {
            kind: BlockKind::Text,
            text: text[last_end..].to_string(),
        });
    }
    blocks
}

pub(crate) const SENTENCE_ENDERS: &[char] =
    &['.', '!', '?', '。', '!', '?', '‼', '⁇', '⁈', '⁉'];

/// Split `text` into sentence-like spans on the configured terminators. The
/// terminator stays attached to the preceding span. Whitespace-only spans are
/// dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if SENTENCE_ENDERS.contains(&ch) {
            spans.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        spans.push(current);
    }
    // Re-merge a span made only of trailing whitespace/punctuation into its predecessor
    // so spans never start with stray closing quotes/spaces.
    let mut merged: Vec<String> = Vec::new();
    for span in spans {
        if span.trim().is_empty() {
            if let Some(last) = merged.last_mut() {
                last.push_str(&span);
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

/// Find the character index of the last sentence-ending punctuation in `text`,
/// or `None` if there isn't one.
pub fn last_sentence_end(text: &str) -> Option<usize> {
    text.char_indices()
        .rev()
        .find(|(_, c)| SENTENCE_ENDERS.contains(c))
        .map(|(i, c)| i + c.len_utf8())
}

pub fn is_word_break(c: char) -> bool {
    c.is_whitespace()
}

/// Remove every `<figure>…</figure>` span, returning just the surrounding prose.
/// Used to test whether a chunk is "purely atomic" (all figure, little text).
pub(crate) fn strip_figures(text: &str) -> String {
    figure_re().replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_and_figure_blocks_in_order() {
        let text = r#"Before. <figure id="f1">content</figure> After."#;
        let blocks = split_blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, BlockKind::Text);
        assert_eq!(blocks[1].kind, BlockKind::Figure);
        assert_eq!(blocks[2].kind, BlockKind::Text);
    }

    #[test]
    fn text_with_no_figures_is_single_block() {
        let blocks = split_blocks("just prose, no markup here.");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Text);
    }

    #[test]
    fn sentence_split_keeps_terminator_attached() {
        let spans = split_sentences("One. Two! Three?");
        assert_eq!(spans, vec!["One. ", "Two! ", "Three?"]);
    }
}
