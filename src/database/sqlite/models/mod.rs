#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Catalog row for one source file seen during ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub source: String,
    pub file_type: String,
    pub unit_count: i64,
    pub chunk_count: i64,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub ingested_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Indexed,
    Skipped,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Indexed => write!(f, "Indexed"),
            DocumentStatus::Skipped => write!(f, "Skipped"),
            DocumentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indexed" => Ok(DocumentStatus::Indexed),
            "skipped" => Ok(DocumentStatus::Skipped),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(format!(
                "unknown status '{other}' (expected indexed, skipped or failed)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub source: String,
    pub file_type: String,
    pub unit_count: i64,
    pub chunk_count: i64,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IngestionRun {
    pub id: i64,
    pub directory: String,
    pub files_seen: i64,
    pub files_indexed: i64,
    pub chunks_created: i64,
    pub started_date: NaiveDateTime,
    pub finished_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngestionRun {
    pub directory: String,
    pub files_seen: i64,
    pub files_indexed: i64,
    pub chunks_created: i64,
    pub started_date: NaiveDateTime,
}

/// Aggregate counts over the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CatalogTotals {
    pub documents: i64,
    pub indexed: i64,
    pub skipped: i64,
    pub failed: i64,
    pub chunks: i64,
}

impl Document {
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.status == DocumentStatus::Indexed
    }
}
