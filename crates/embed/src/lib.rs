//! SkillMatch embedding providers
//!
//! The `EmbeddingProvider` trait plus an Ollama HTTP client and an offline
//! hashing embedder

mod client;
mod hashing;
mod provider;
mod types;

pub use client::OllamaClient;
pub use hashing::{tokenize, HashingEmbedder};
pub use provider::EmbeddingProvider;
pub use types::{BatchEmbedRequest, BatchEmbedResponse, EmbedRequest, EmbedResponse};

use skillmatch_common::{AppConfig, EmbeddingBackend, Result};
use std::sync::Arc;

/// Embedding provider selected by `config.embedding_backend`
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
        EmbeddingBackend::Ollama => Arc::new(OllamaClient::new(
            config.ollama_base_url.clone(),
            config.embedding_model.clone(),
        )?),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.hashing_dimension)),
    };
    Ok(provider)
}
