
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

pub const TAVILY_API_KEY_ENV: &str = "TAVILY_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub web: WebSearchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection to the Ollama server and the embedding model it serves
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

/// Text generation model and its fixed sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    /// Vision model used to read text out of image attachments
    pub vision_model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub max_new_tokens: u32,
    pub timeout_seconds: u64,
    /// Rewrite Markdown code fences as `<pre>` blocks in answers
    pub html_code_blocks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Default for requests that do not say otherwise
    pub enabled: bool,
    pub tavily_api_key: Option<String>,
    pub max_web_results: usize,
    pub max_wiki_docs: usize,
    pub tavily_endpoint: String,
    pub wikipedia_endpoint: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "mistral:7b-instruct".to_string(),
            vision_model: "llava:latest".to_string(),
            temperature: 0.3,
            top_k: 50,
            top_p: 0.95,
            repetition_penalty: 1.2,
            max_new_tokens: 1024,
            timeout_seconds: 300,
            html_code_blocks: false,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tavily_api_key: None,
            max_web_results: 3,
            max_wiki_docs: 2,
            tavily_endpoint: "https://api.tavily.com/search".to_string(),
            wikipedia_endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
        }
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            generation: GenerationConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            web: WebSearchConfig::default(),
            base_dir: Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".matbot")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 64 and 8192 characters)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid retrieval top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid sampling top_k: {0} (must be greater than 0)")]
    InvalidSamplingTopK(u32),
    #[error("Invalid top_p: {0} (must be greater than 0.0 and at most 1.0)")]
    InvalidTopP(f32),
    #[error("Invalid repetition penalty: {0} (must be greater than 0.0)")]
    InvalidRepetitionPenalty(f32),
    #[error("Invalid max new tokens: {0} (must be between 1 and 8192)")]
    InvalidMaxNewTokens(u32),
    #[error("Invalid web result limit: {0} (must be between 1 and 20)")]
    InvalidResultLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// `~/.matbot`, or the platform data directory when there is no home directory
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".matbot"))
            .or_else(|| dirs::data_dir().map(|data| data.join("matbot")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.generation.validate()?;
        self.validate_chunking_config()?;

        if !(1..=50).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        self.web.validate()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(64..=8192).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// SQLite catalog of ingested files
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("catalog.db")
    }

    /// LanceDB directory holding the chunk vectors
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    /// Side file with the raw chunk text and metadata of the last ingestion
    #[inline]
    pub fn chunk_dump_path(&self) -> PathBuf {
        self.get_base_dir().join("chunks.json")
    }

    /// JSON user and chat session store
    #[inline]
    pub fn user_store_path(&self) -> PathBuf {
        self.get_base_dir().join("users.json")
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.vision_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.vision_model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.top_k == 0 {
            return Err(ConfigError::InvalidSamplingTopK(self.top_k));
        }

        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(ConfigError::InvalidTopP(self.top_p));
        }

        if self.repetition_penalty <= 0.0 {
            return Err(ConfigError::InvalidRepetitionPenalty(
                self.repetition_penalty,
            ));
        }

        if !(1..=8192).contains(&self.max_new_tokens) {
            return Err(ConfigError::InvalidMaxNewTokens(self.max_new_tokens));
        }

        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }
}

impl WebSearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for limit in [self.max_web_results, self.max_wiki_docs] {
            if !(1..=20).contains(&limit) {
                return Err(ConfigError::InvalidResultLimit(limit));
            }
        }

        for endpoint in [&self.tavily_endpoint, &self.wikipedia_endpoint] {
            Url::parse(endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.clone()))?;
        }

        Ok(())
    }

    /// The configured Tavily key, falling back to `TAVILY_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        self.tavily_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                std::env::var(TAVILY_API_KEY_ENV)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
    }
}
