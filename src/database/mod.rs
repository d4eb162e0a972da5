// Catalog of ingested files lives in SQLite, chunk vectors in LanceDB

pub mod lancedb;
pub mod sqlite;

pub use lancedb::{EmbeddingRecord, SearchResult, StoredChunk, VectorStore};
pub use sqlite::*;
