//! Offline feature-hashing embedder
//!
//! Each lowercased alphanumeric token is hashed with SHA-256 into one of
//! `dimension` buckets and counted. The result is deterministic across runs
//! and platforms, needs no model server, and gives texts that share words a
//! positive cosine similarity.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use skillmatch_common::Result;

use crate::provider::EmbeddingProvider;

/// Bag-of-words hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create embedder producing vectors of `dimension` components (minimum 1)
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed synchronously; text without tokens yields the zero vector
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }
        vector
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dimension as u64) as usize
    }
}

/// Split into lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_id(&self) -> String {
        format!("hashing-{}", self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("Intro to Python (3.x), NASSCOM").collect();
        assert_eq!(tokens, vec!["intro", "to", "python", "3", "x", "nasscom"]);
    }

    #[test]
    fn test_vectorize_deterministic_and_sized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.vectorize("Data Science with R");
        let b = embedder.vectorize("Data Science with R");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_eq!(a.iter().sum::<f32>(), 4.0);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(128);
        assert_eq!(embedder.vectorize("PYTHON!"), embedder.vectorize("python"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(32);
        assert!(embedder.vectorize("").iter().all(|&x| x == 0.0));
        assert!(embedder.vectorize("  --  ").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_shared_words_overlap() {
        let embedder = HashingEmbedder::new(1024);
        let query = embedder.vectorize("python programming");
        let item = embedder.vectorize("Intro to Python");
        assert!(dot(&query, &item) >= 1.0);
    }

    #[test]
    fn test_zero_dimension_clamped() {
        let embedder = HashingEmbedder::new(0);
        assert_eq!(embedder.dimension(), 1);
        assert_eq!(embedder.model_id(), "hashing-1");
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashingEmbedder::new(256);
        let texts = vec!["web development".to_string(), "leadership".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&embedder.embed(text).await.unwrap(), vector);
        }
    }
}
