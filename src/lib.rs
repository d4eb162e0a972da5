use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatbotError>;

#[derive(Error, Debug)]
pub enum MatbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod attachments;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
mod http;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod search;
pub mod sessions;
