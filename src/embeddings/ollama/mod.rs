
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::embeddings::chunking::DocumentChunk;
use crate::http::{agent_with_timeout, request_with_retry};

/// Output size of `nomic-embed-text`
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Blocking client for the Ollama embedding endpoints
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Index of the chunk this embedding was computed for
    pub chunk_index: Option<usize>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.ollama.model.clone(),
            batch_size: config.ollama.batch_size.max(1),
            agent: agent_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = agent_with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_model().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);

        request_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured embedding model is available
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        self.ensure_model_available(&self.model)
    }

    /// Check that `model` is pulled on the server.
    ///
    /// A name without a tag also matches its `:latest` variant.
    #[inline]
    pub fn ensure_model_available(&self, model: &str) -> Result<()> {
        debug!("Validating model: {}", model);

        let models = self.list_models().context("Failed to list models")?;

        let matches = |name: &str| {
            name == model || (!model.contains(':') && name == format!("{model}:latest"))
        };

        if models.iter().any(|m| matches(&m.name)) {
            debug!("Model {} is available", model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                model, available_models
            );
            Err(anyhow::anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                model,
                available_models
            ))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = request_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate the embedding of a single text, used for queries
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        debug!("Generating embedding for text (length: {})", text.len());

        let inputs = [text.to_string()];
        let mut embeddings = self
            .embed(&inputs)
            .context("Failed to generate embedding")?;

        let embedding = embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Ollama returned no embedding"))?;

        debug!("Generated embedding with {} dimensions", embedding.len());

        Ok(EmbeddingResult {
            text: text.to_string(),
            embedding,
            chunk_index: None,
        })
    }

    /// Generate embeddings for many texts, `batch_size` texts per request
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size as usize) {
            let embeddings = self
                .embed(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;

            results.extend(
                batch
                    .iter()
                    .zip(embeddings)
                    .map(|(text, embedding)| EmbeddingResult {
                        text: text.clone(),
                        embedding,
                        chunk_index: None,
                    }),
            );
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    /// Embed document chunks, keeping their positions
    #[inline]
    pub fn generate_chunk_embeddings(
        &self,
        chunks: &[DocumentChunk],
    ) -> Result<Vec<EmbeddingResult>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} document chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut results = self.generate_embeddings_batch(&texts)?;

        for (result, chunk) in results.iter_mut().zip(chunks) {
            result.chunk_index = Some(chunk.metadata.chunk_index);
        }

        Ok(results)
    }

    fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;

        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: inputs,
        })
        .context("Failed to serialize embedding request")?;

        let response_text = request_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        if response.embeddings.len() != inputs.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                inputs.len(),
                response.embeddings.len()
            ));
        }

        Ok(response.embeddings)
    }
}
