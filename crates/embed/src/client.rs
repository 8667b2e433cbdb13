use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use skillmatch_common::{Result, SkillMatchError};
use tracing::{debug, info};

use crate::provider::EmbeddingProvider;
use crate::types::{BatchEmbedRequest, BatchEmbedResponse, EmbedRequest, EmbedResponse};

const MAX_RETRIES: u32 = 3;

/// Ollama embedding client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    /// Create new Ollama client for one embedding model
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // large batches on CPU are slow
            .build()
            .map_err(|e| SkillMatchError::embedding(format!("Failed to create HTTP client: {}", e)))?;

        info!("Ollama client initialized: {} (model: {})", base_url, model);
        Ok(Self { base_url, model, client })
    }

    /// Test connection to Ollama
    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await
            .map_err(|e| SkillMatchError::embedding(format!("Failed to connect to Ollama: {}", e)))?;
        Ok(response.status().is_success())
    }

    /// POST a JSON request, retrying with exponential backoff
    async fn post_with_retry<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.try_post(url, request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let delay = std::time::Duration::from_secs(2u64.pow(attempt - 1));
                        tracing::warn!(
                            "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt,
                            MAX_RETRIES,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SkillMatchError::embedding("All retries failed")))
    }

    /// Single attempt
    async fn try_post<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| SkillMatchError::embedding(format!("Failed to send embedding request: {}", e)))?
            .error_for_status()
            .map_err(|e| SkillMatchError::embedding(format!("Ollama embedding API error: {}", e)))?;

        response.json().await
            .map_err(|e| SkillMatchError::embedding(format!("Failed to parse embedding response: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        debug!("Generating embedding - Model: {}, Text length: {}", self.model, text.len());

        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };
        let result: EmbedResponse = self.post_with_retry(&url, &request).await?;

        if result.embedding.is_empty() {
            return Err(SkillMatchError::embedding("Empty embedding from Ollama"));
        }

        debug!("Received embedding - Dimension: {}", result.embedding.len());
        Ok(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        debug!("Generating {} embeddings - Model: {}", texts.len(), self.model);

        let request = BatchEmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };
        let result: BatchEmbedResponse = self.post_with_retry(&url, &request).await?;

        if result.embeddings.len() != texts.len() {
            return Err(SkillMatchError::embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }
        if result.embeddings.iter().any(|e| e.is_empty()) {
            return Err(SkillMatchError::embedding("Empty embedding in Ollama batch response"));
        }

        Ok(result.embeddings)
    }

    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
