
use super::models::{
    CatalogTotals, Document, DocumentStatus, IngestionRun, NewDocument, NewIngestionRun,
};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const DOCUMENT_COLUMNS: &str = "id, source, file_type, unit_count, chunk_count, status, \
                                error_message, ingested_date";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert or replace the catalog row for `document.source`
    #[inline]
    pub async fn upsert(pool: &SqlitePool, document: &NewDocument) -> Result<Document> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO documents (source, file_type, unit_count, chunk_count, status, error_message, ingested_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source) DO UPDATE SET
                file_type = excluded.file_type,
                unit_count = excluded.unit_count,
                chunk_count = excluded.chunk_count,
                status = excluded.status,
                error_message = excluded.error_message,
                ingested_date = excluded.ingested_date
            "#,
        )
        .bind(&document.source)
        .bind(&document.file_type)
        .bind(document.unit_count)
        .bind(document.chunk_count)
        .bind(document.status)
        .bind(&document.error_message)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to record document {}", document.source))?;

        debug!("Recorded {} as {}", document.source, document.status);

        Self::get_by_source(pool, &document.source)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve recorded document"))
    }

    #[inline]
    pub async fn get_by_source(pool: &SqlitePool, source: &str) -> Result<Option<Document>> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE source = ?");
        sqlx::query_as::<_, Document>(&query)
            .bind(source)
            .fetch_optional(pool)
            .await
            .context("Failed to get document by source")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Document>> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY source");
        sqlx::query_as::<_, Document>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list documents")
    }

    #[inline]
    pub async fn list_by_status(
        pool: &SqlitePool,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        let query =
            format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ? ORDER BY source");
        sqlx::query_as::<_, Document>(&query)
            .bind(status)
            .fetch_all(pool)
            .await
            .context("Failed to list documents by status")
    }

    /// Remove every catalog row, returning how many were deleted
    #[inline]
    pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents")
            .execute(pool)
            .await
            .context("Failed to clear document catalog")?;

        Ok(result.rows_affected())
    }

    #[inline]
    pub async fn totals(pool: &SqlitePool) -> Result<CatalogTotals> {
        sqlx::query_as::<_, CatalogTotals>(
            r#"
            SELECT COUNT(*) AS documents,
                   COALESCE(SUM(status = 'indexed'), 0) AS indexed,
                   COALESCE(SUM(status = 'skipped'), 0) AS skipped,
                   COALESCE(SUM(status = 'failed'), 0) AS failed,
                   COALESCE(SUM(chunk_count), 0) AS chunks
            FROM documents
            "#,
        )
        .fetch_one(pool)
        .await
        .context("Failed to compute catalog totals")
    }
}

pub struct IngestionRunQueries;

impl IngestionRunQueries {
    #[inline]
    pub async fn record(pool: &SqlitePool, run: &NewIngestionRun) -> Result<IngestionRun> {
        let finished = Utc::now().naive_utc();

        let id = sqlx::query(
            r#"
            INSERT INTO ingestion_runs (directory, files_seen, files_indexed, chunks_created, started_date, finished_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.directory)
        .bind(run.files_seen)
        .bind(run.files_indexed)
        .bind(run.chunks_created)
        .bind(run.started_date)
        .bind(finished)
        .execute(pool)
        .await
        .context("Failed to record ingestion run")?
        .last_insert_rowid();

        sqlx::query_as::<_, IngestionRun>("SELECT * FROM ingestion_runs WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .context("Failed to retrieve ingestion run")
    }

    #[inline]
    pub async fn latest(pool: &SqlitePool) -> Result<Option<IngestionRun>> {
        sqlx::query_as::<_, IngestionRun>(
            "SELECT * FROM ingestion_runs ORDER BY finished_date DESC, id DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await
        .context("Failed to get latest ingestion run")
    }
}
