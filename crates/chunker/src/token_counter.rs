//! Cheap, model-agnostic token length estimation.
//!
//! A real tokenizer is not available at this layer (the chunker must stay usable
//! before an embeddings provider, or its tokenizer, has been selected). Instead we
//! approximate using a chars-per-token ratio that varies by script, since CJK and
//! Arabic text tokenize much denser than Latin text under BPE-style tokenizers.

/// CJK unified ideographs, hiragana/katakana, hangul, and their extension blocks.
fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF   // hiragana & katakana
        | 0x3400..=0x4DBF // CJK ext A
        | 0x4E00..=0x9FFF // CJK unified ideographs
        | 0xAC00..=0xD7A3 // hangul syllables
        | 0xF900..=0xFAFF // CJK compatibility ideographs
        | 0x20000..=0x2A6DF // CJK ext B
    )
}

fn is_arabic(c: char) -> bool {
    matches!(c as u32,
        0x0600..=0x06FF
        | 0x0750..=0x077F
        | 0x08A0..=0x08FF
        | 0xFB50..=0xFDFF
        | 0xFE70..=0xFEFF
    )
}

/// Chars-per-token divisors, tuned against common BPE tokenizer behavior.
const LATIN_CHARS_PER_TOKEN: usize = 4;
const CJK_CHARS_PER_TOKEN: usize = 2;
const ARABIC_CHARS_PER_TOKEN: usize = 5;

pub struct TokenCounter;

impl TokenCounter {
    /// Estimate the token count of `text`.
    ///
    /// Pure-ASCII text takes a fast path (`len() / 4`, since `len()` and
    /// `chars().count()` agree for ASCII). Mixed-script text is bucketed by
    /// script and each bucket divided by its own chars-per-token ratio, so a
    /// string that's mostly CJK with a little Latin punctuation doesn't get
    /// diluted into the wrong ratio.
    pub fn estimate(text: &str) -> usize {
        if text.is_ascii() {
            return text.len() / LATIN_CHARS_PER_TOKEN;
        }

        let mut cjk = 0usize;
        let mut arabic = 0usize;
        let mut other = 0usize;
        for c in text.chars() {
            if is_cjk(c) {
                cjk += 1;
            } else if is_arabic(c) {
                arabic += 1;
            } else {
                other += 1;
            }
        }

        cjk / CJK_CHARS_PER_TOKEN + arabic / ARABIC_CHARS_PER_TOKEN + other / LATIN_CHARS_PER_TOKEN
    }

    /// Estimate tokens for several spans at once, summing individually rather than
    /// concatenating first (concatenation would let a script-boundary shift bucket
    /// counts across spans that the caller wants independent).
    pub fn estimate_many<'a, I: IntoIterator<Item = &'a str>>(spans: I) -> usize {
        spans.into_iter().map(Self::estimate).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(TokenCounter::estimate(""), 0);
    }

    #[test]
    fn estimate_many_sums_independently() {
        let total = TokenCounter::estimate_many(["Hello world this is a test", "これは日本語です"]);
        assert_eq!(total, TokenCounter::estimate("Hello world this is a test") + TokenCounter::estimate("これは日本語です"));
    }
}
