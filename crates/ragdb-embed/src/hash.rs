//! Deterministic hashing embedder for tests and offline development.
//!
//! Buckets tokens by xxHash into a fixed-dimension vector, with a small
//! positional term so token order matters, then L2-normalizes. Identical
//! input always yields an identical vector.

use async_trait::async_trait;

use ragdb_core::traits::EmbeddingBackend;
use ragdb_core::types::EmbeddingVector;

pub const DEFAULT_DIM: usize = 1024;

pub struct HashingBackend {
    dim: usize,
}

impl HashingBackend {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_text(&self, text: &str) -> EmbeddingVector {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingBackend for HashingBackend {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
