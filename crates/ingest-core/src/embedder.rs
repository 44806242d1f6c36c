//! Shared embedding result type used by local embedder backends.
//!
//! This crate only needs single-vector (one embedding per chunk) backends —
//! the capability contract in [`crate::capability::EmbeddingsProvider`] is
//! `embed_batch(texts) -> Vec<Vec<f32>>`, scored by cosine similarity
//! downstream in the vector store. Multi-vector / late-interaction models are
//! out of scope for this default local backend.

use anyhow::Result;

/// A single embedding vector plus its dimensionality, returned by a backend.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub data: Vec<f32>,
}

impl EmbeddingResult {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn embedding_dim(&self) -> usize {
        self.data.len()
    }
}

/// Implement this trait to add a new local embedding backend.
pub trait EmbedderBackend: Send {
    fn embed_document(&mut self, text: &str) -> Result<EmbeddingResult>;

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<EmbeddingResult>> {
        texts.iter().map(|text| self.embed_document(text)).collect()
    }

    fn embedding_dim(&self) -> usize;

    /// The backend's declared maximum input sequence length, in tokens. Fed
    /// into the chunker's dynamic limit adjustment (§4.1).
    fn max_seq_length(&self) -> usize;
}

/// Cosine similarity between two single-vector embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_mismatched_length_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
