use async_trait::async_trait;
use skillmatch_common::Result;

/// Maps text to a fixed-length vector
///
/// Implementations must be deterministic for a fixed [`model_id`](EmbeddingProvider::model_id)
/// and return vectors of the same dimension for every input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for many texts, in input order
    ///
    /// The default calls [`embed`](EmbeddingProvider::embed) once per text.
    /// Backends with native batching should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Identity of the model behind this provider, recorded in the index manifest
    fn model_id(&self) -> String;
}
