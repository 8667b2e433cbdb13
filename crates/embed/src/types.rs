use serde::{Deserialize, Serialize};

/// Ollama single embedding request (`/api/embeddings`)
#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest {
    /// Model name (e.g., "all-minilm", "nomic-embed-text")
    pub model: String,

    /// Text to embed
    pub prompt: String,
}

/// Ollama single embedding response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedResponse {
    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// Ollama batch embedding request (`/api/embed`)
#[derive(Debug, Clone, Serialize)]
pub struct BatchEmbedRequest {
    /// Model name
    pub model: String,

    /// Texts to embed, in order
    pub input: Vec<String>,
}

/// Ollama batch embedding response
#[derive(Debug, Clone, Deserialize)]
pub struct BatchEmbedResponse {
    /// Model that produced the embeddings
    #[serde(default)]
    pub model: String,

    /// One embedding per input, same order
    pub embeddings: Vec<Vec<f32>>,
}
