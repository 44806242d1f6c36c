//! Default `EmbeddingsProvider` implementations (§6.5): `Candle` (local
//! model) and `Deterministic` (hash-based, zero-download fallback used by
//! default in tests).

use crate::capability::EmbeddingsProvider;
use crate::embedder::EmbedderBackend;
use crate::embedder_unixcoder::{UniXcoderEmbedder, UNIXCODER_DIM};
use anyhow::Result;
use async_trait::async_trait;
use candle_core::Device;
use std::sync::Mutex;

/// Wraps the candle-backed `UniXcoderEmbedder` behind the batch-oriented
/// `EmbeddingsProvider` contract. `Mutex`-guarded because `candle`'s forward
/// pass takes `&mut self` (KV/workspace buffers) while the capability trait
/// is `&self`.
pub struct CandleEmbeddings {
    inner: Mutex<UniXcoderEmbedder>,
}

impl CandleEmbeddings {
    pub fn load() -> Result<Self> {
        let device = Device::Cpu;
        let inner = UniXcoderEmbedder::new(&device)?;
        Ok(Self { inner: Mutex::new(inner) })
    }
}

/// Hash-based fixed-dimension embedder with no model download. Used as the
/// zero-dependency default in tests: two pieces of text that share bigrams
/// land closer together in cosine space than unrelated ones, without ever
/// touching the network.
pub struct DeterministicEmbeddings {
    dims: usize,
    max_seq_length: usize,
}

impl DeterministicEmbeddings {
    pub fn new(dims: usize, max_seq_length: usize) -> Self {
        Self { dims, max_seq_length }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return vec;
        }
        for window in words.windows(2).chain(words.windows(1).filter(|_| words.len() == 1)) {
            let token = window.join(" ");
            let hash = md5::compute(token.as_bytes());
            let bucket = (u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]) as usize) % self.dims;
            vec[bucket] += 1.0;
        }
        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);
        for v in &mut vec {
            *v /= norm;
        }
        vec
    }
}

/// Tagged enum over every built-in `EmbeddingsProvider`.
pub enum EmbeddingsProviderImpl {
    Candle(CandleEmbeddings),
    Deterministic(DeterministicEmbeddings),
}

#[async_trait]
impl EmbeddingsProvider for EmbeddingsProviderImpl {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            EmbeddingsProviderImpl::Candle(c) => {
                let mut guard = c.inner.lock().expect("embedder mutex poisoned");
                let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
                let results = guard.embed_batch(&refs)?;
                Ok(results.into_iter().map(|r| r.data).collect())
            }
            EmbeddingsProviderImpl::Deterministic(d) => {
                Ok(texts.iter().map(|t| d.embed_one(t)).collect())
            }
        }
    }

    fn dimensions(&self) -> usize {
        match self {
            EmbeddingsProviderImpl::Candle(_) => UNIXCODER_DIM,
            EmbeddingsProviderImpl::Deterministic(d) => d.dims,
        }
    }

    fn max_seq_length(&self) -> usize {
        match self {
            EmbeddingsProviderImpl::Candle(c) => c.inner.lock().expect("embedder mutex poisoned").max_seq_length(),
            EmbeddingsProviderImpl::Deterministic(d) => d.max_seq_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_embeddings_preserve_order_and_dimension() {
        let provider = EmbeddingsProviderImpl::Deterministic(DeterministicEmbeddings::new(64, 512));
        let texts = vec!["hello world".to_string(), "goodbye world".to_string()];
        let vecs = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[0].len(), 64);
        assert_eq!(provider.dimensions(), 64);
    }

    #[tokio::test]
    async fn deterministic_embeddings_are_l2_normalized() {
        let provider = EmbeddingsProviderImpl::Deterministic(DeterministicEmbeddings::new(32, 512));
        let vecs = provider.embed_batch(&["some repeated text".to_string()]).await.unwrap();
        let norm: f32 = vecs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
