// Text splitting and Ollama embedding generation

pub mod chunking;
pub mod ollama;

pub use chunking::{
    ChunkMetadata, ChunkingConfig, DocumentChunk, SourceDocument, TextSplitter, split_documents,
};
pub use ollama::{EmbeddingResult, OllamaClient};
