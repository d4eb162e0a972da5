// LanceDB vector storage for document chunks


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::chunking::{ChunkMetadata, DocumentChunk};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: StoredChunk,
}

/// Chunk text and metadata stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// File name the chunk was cut from
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: u32,
    pub content: String,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl EmbeddingRecord {
    /// Pair a chunk with its vector under a fresh id
    #[inline]
    pub fn from_chunk(chunk: &DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            chunk: StoredChunk {
                source: chunk.metadata.source.clone(),
                page: chunk.metadata.page,
                chunk_index: u32::try_from(chunk.metadata.chunk_index).unwrap_or(u32::MAX),
                content: chunk.content.clone(),
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }
}

impl StoredChunk {
    /// Metadata handed back to callers as a citation
    #[inline]
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source.clone(),
            page: self.page,
            chunk_index: self.chunk_index as usize,
        }
    }
}
