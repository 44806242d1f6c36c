//! Chunker configuration, including the dynamic limit adjustment of §4.1.

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerConfig {
    /// Target minimum tokens per chunk.
    pub max_tokens: usize,
    /// Hard max tokens per chunk (non-atomic chunks never exceed this).
    pub max_section_tokens: usize,
    /// Soft character ceiling, enforced unless `disable_char_limit`.
    pub max_chars: usize,
    /// Target overlap, as a percentage of `max_tokens`.
    pub overlap_percent: f32,
    /// Whether overlap is unconditionally applied across page boundaries.
    pub cross_page_overlap: bool,
    /// Disable the soft character ceiling entirely.
    pub disable_char_limit: bool,
    /// The embeddings provider's declared max sequence length, if known.
    pub embedding_max_tokens: Option<usize>,
    /// Multiplier applied to `max_tokens` for the table-legend lookahead rule (default 2.5).
    pub table_legend_buffer_multiplier: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
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
}

impl ChunkerConfig {
    /// Apply the dynamic limit adjustment: when the embeddings provider declares
    /// a max sequence length, shrink `max_section_tokens`/`max_tokens` to leave a
    /// 15% safety margin for overlap- and orphan-merge-driven growth.
    pub fn adjusted(&self) -> Self {
        let mut out = self.clone();
        let Some(m) = self.embedding_max_tokens else {
            return out;
        };
        let safe =
            (m as f32 * 0.85 / (1.0 + self.overlap_percent / 100.0)).floor() as usize;
        if safe < out.max_section_tokens {
            tracing::info!(
                previous = out.max_section_tokens,
                adjusted = safe,
                "shrinking max_section_tokens to fit embedding model sequence limit"
            );
            out.max_section_tokens = safe;
        }
        if safe < out.max_tokens {
            tracing::info!(
                previous = out.max_tokens,
                adjusted = safe,
                "shrinking max_tokens to fit embedding model sequence limit"
            );
            out.max_tokens = safe;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_adjustment_without_embedding_max() {
        let cfg = ChunkerConfig::default();
        assert_eq!(cfg.adjusted(), cfg);
    }

    #[test]
    fn shrinks_limits_for_small_embedding_ceiling() {
        let cfg = ChunkerConfig {
            embedding_max_tokens: Some(256),
            overlap_percent: 10.0,
            ..ChunkerConfig::default()
        };
        let adjusted = cfg.adjusted();
        // floor(256 * 0.85 / 1.1) = 197
        assert_eq!(adjusted.max_section_tokens, 197);
        assert_eq!(adjusted.max_tokens, 197);
    }

    #[test]
    fn leaves_generous_limits_untouched() {
        let cfg = ChunkerConfig {
            embedding_max_tokens: Some(8192),
            ..ChunkerConfig::default()
        };
        let adjusted = cfg.adjusted();
        assert_eq!(adjusted.max_section_tokens, cfg.max_section_tokens);
        assert_eq!(adjusted.max_tokens, cfg.max_tokens);
    }
}
