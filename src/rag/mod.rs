// Query answering: retrieve chunks, optionally add web context, prompt the model

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::lancedb::{SearchResult, VectorStore};
use crate::embeddings::chunking::ChunkMetadata;
use crate::embeddings::ollama::OllamaClient;
use crate::llm::{GenerationClient, extract_answer, format_prompt, render_code_blocks};
use crate::search::WebContext;

/// Answer and the metadata of the chunks it was conditioned on
#[derive(Debug, Clone, PartialEq)]
pub struct RagResponse {
    pub answer: String,
    pub citations: Vec<ChunkMetadata>,
    /// Whether any web or Wikipedia text made it into the prompt
    pub used_web_context: bool,
}

/// Model and index handles, created once and reused for every question
pub struct RagPipeline {
    config: Config,
    vector_store: VectorStore,
    embedder: OllamaClient,
    generator: GenerationClient,
    web: Option<WebContext>,
}

impl RagPipeline {
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let vector_store = VectorStore::new(&config)
            .await
            .context("Failed to open vector store")?;

        let embedder = OllamaClient::new(&config).context("Failed to create embedding client")?;
        let generator =
            GenerationClient::new(&config).context("Failed to create generation client")?;

        let web = match WebContext::new(&config.web) {
            Ok(web) => Some(web),
            Err(e) => {
                warn!("Web search unavailable: {:#}", e);
                None
            }
        };

        info!(
            "RAG pipeline ready (embedding {}, generation {})",
            embedder.model(),
            generator.model()
        );

        Ok(Self {
            config,
            vector_store,
            embedder,
            generator,
            web,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    /// The `retrieval.top_k` chunks nearest to `query`, in store order
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query_embedding = self
            .embedder
            .generate_embedding(query)
            .context("Failed to embed query")?
            .embedding;

        let results = self
            .vector_store
            .search_similar(&query_embedding, self.config.retrieval.top_k)
            .await
            .context("Vector search failed")?;

        debug!("Retrieved {} chunks", results.len());
        Ok(results)
    }

    /// Web and Wikipedia text for `query`, empty without making any request unless
    /// `use_web` is set
    #[inline]
    pub fn web_context(&self, query: &str, use_web: bool) -> String {
        match (&self.web, use_web) {
            (Some(web), true) => web.gather(query),
            _ => String::new(),
        }
    }

    #[inline]
    pub fn build_prompt(query: &str, results: &[SearchResult], web_context: &str) -> String {
        let chunks: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        format_prompt(query, &chunks, web_context)
    }

    #[inline]
    pub async fn answer(&self, query: &str, use_web: bool) -> Result<RagResponse> {
        info!("Answering question (web search: {})", use_web);

        let results = self.retrieve(query).await?;
        let web_context = self.web_context(query, use_web);
        let prompt = Self::build_prompt(query, &results, &web_context);

        let generated = self.generator.generate(&prompt)?;
        let mut answer = extract_answer(&generated);
        if self.config.generation.html_code_blocks {
            answer = render_code_blocks(&answer);
        }

        Ok(RagResponse {
            answer,
            citations: results.iter().map(|r| r.chunk.metadata()).collect(),
            used_web_context: !web_context.trim().is_empty(),
        })
    }
}
