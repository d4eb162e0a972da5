use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;


pub mod models;
pub mod queries;

pub use models::{
    CatalogTotals, Document, DocumentStatus, IngestionRun, NewDocument, NewIngestionRun,
};
pub use queries::{DocumentQueries, IngestionRunQueries};

pub type DbPool = Pool<Sqlite>;

/// SQLite catalog of ingested files and ingestion runs
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open (or create) `catalog.db` under `config_dir`
    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("catalog.db")).await
    }

    #[inline]
    pub async fn initialize(config: &Config) -> Result<Self> {
        Self::initialize_from_config_dir(config.get_base_dir()).await
    }

    #[inline]
    pub async fn record_document(&self, document: &NewDocument) -> Result<Document> {
        DocumentQueries::upsert(&self.pool, document).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn list_documents_with_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        DocumentQueries::list_by_status(&self.pool, status).await
    }

    #[inline]
    pub async fn clear_documents(&self) -> Result<u64> {
        DocumentQueries::delete_all(&self.pool).await
    }

    #[inline]
    pub async fn totals(&self) -> Result<CatalogTotals> {
        DocumentQueries::totals(&self.pool).await
    }

    #[inline]
    pub async fn record_run(&self, run: &NewIngestionRun) -> Result<IngestionRun> {
        IngestionRunQueries::record(&self.pool, run).await
    }

    #[inline]
    pub async fn latest_run(&self) -> Result<Option<IngestionRun>> {
        IngestionRunQueries::latest(&self.pool).await
    }
}
