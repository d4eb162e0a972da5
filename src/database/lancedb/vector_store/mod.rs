
use super::{EmbeddingRecord, StoredChunk};
use crate::{MatbotError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const TABLE_NAME: &str = "chunks";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

/// One chunk returned by a similarity search, in store order
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: StoredChunk,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the vector database under the configured base directory, creating the
    /// `chunks` table when it does not exist yet
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, MatbotError> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            MatbotError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.display().to_string();

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        MatbotError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(MatbotError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let mut store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension: config.ollama.embedding_dimension as usize,
        };

        store.initialize_table_with_recovery().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    async fn initialize_table(&mut self) -> Result<(), MatbotError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Chunks table already exists, detecting vector dimension");
            match self.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    self.vector_dimension = dim;
                    debug!("Detected existing vector dimension: {}", dim);
                }
                Err(e) => warn!(
                    "Could not detect vector dimension from existing table: {}",
                    e
                ),
            }
            return Ok(());
        }

        self.create_table(self.vector_dimension).await
    }

    async fn create_table(&self, vector_dim: usize) -> Result<(), MatbotError> {
        let schema = Self::create_schema(vector_dim);

        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to create table: {}", e)))?;

        info!("Chunks table created with {} dimensions", vector_dim);
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize, MatbotError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        MatbotError::Database(format!("Invalid vector dimension: {}", size))
                    });
                }
            }
        }

        Err(MatbotError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    i32::try_from(vector_dim).unwrap_or(i32::MAX),
                ),
                false,
            ),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, true),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<lancedb::Table, MatbotError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to open table: {}", e)))
    }

    /// Store multiple embeddings in a batch.
    ///
    /// When the vectors do not match the table's dimension the table is recreated first.
    #[inline]
    pub async fn store_embeddings_batch(
        &mut self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<(), MatbotError> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };

        debug!("Storing batch of {} embeddings", records.len());

        let vector_dim = first.vector.len();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(MatbotError::Embedding(format!(
                "Inconsistent embedding dimensions in batch: {} vs {}",
                vector_dim,
                bad.vector.len()
            )));
        }

        if self.vector_dimension != vector_dim {
            info!(
                "Vector dimension changed from {} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.drop_table_if_exists().await?;
            self.create_table(vector_dim).await?;
            self.vector_dimension = vector_dim;
        }

        let record_batch = self.create_record_batch(&records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to insert embeddings: {}", e)))?;

        debug!("Stored {} embeddings", records.len());
        Ok(())
    }

    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch, MatbotError> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            sources.push(record.chunk.source.as_str());
            pages.push(record.chunk.page);
            chunk_indices.push(record.chunk.chunk_index);
            contents.push(record.chunk.content.as_str());
            created_ats.push(record.chunk.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            i32::try_from(vector_dim).unwrap_or(i32::MAX),
            Arc::new(values_array),
            None,
        )
        .map_err(|e| MatbotError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| MatbotError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Return the `limit` chunks nearest to `query_vector`, closest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, MatbotError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if limit == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.vector_dimension {
            return Err(MatbotError::Embedding(format!(
                "Query vector has {} dimensions but the index stores {}",
                query_vector.len(),
                self.vector_dimension
            )));
        }

        if self.count_embeddings().await? == 0 {
            debug!("Vector table is empty");
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| MatbotError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = self.parse_search_results_stream(results).await?;
        search_results.truncate(limit);
        Ok(search_results)
    }

    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, MatbotError> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, MatbotError> {
        let sources = string_column(batch, "source")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;
        let pages = u32_column(batch, "page")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let chunk = StoredChunk {
                source: sources.value(row).to_string(),
                page: (!pages.is_null(row)).then(|| pages.value(row)),
                chunk_index: chunk_indices.value(row),
                content: contents.value(row).to_string(),
                created_at: created_ats.value(row).to_string(),
            };

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                chunk,
                similarity_score: 1.0 - distance,
                distance,
            });
        }

        Ok(search_results)
    }

    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64, MatbotError> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| MatbotError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Drop every stored chunk, keeping an empty table of the current dimension
    #[inline]
    pub async fn reset(&mut self) -> Result<(), MatbotError> {
        info!("Resetting vector table {}", self.table_name);
        self.drop_table_if_exists().await?;
        self.create_table(self.vector_dimension).await
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), MatbotError> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                MatbotError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        std::fs::create_dir_all(db_path).map_err(|e| {
            MatbotError::Database(format!("Failed to recreate vector database directory: {}", e))
        })?;

        info!("Database corruption recovery completed");
        Ok(())
    }

    async fn initialize_table_with_recovery(&mut self) -> Result<(), MatbotError> {
        match self.initialize_table().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("schema")
                {
                    warn!("Table corruption detected during initialization: {}", e);

                    if let Err(drop_err) = self.drop_table_if_exists().await {
                        warn!("Failed to drop corrupted table: {}", drop_err);
                    }

                    self.initialize_table().await.map_err(|e| {
                        MatbotError::Database(format!(
                            "Failed to recreate table after corruption: {}",
                            e
                        ))
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn drop_table_if_exists(&self) -> Result<(), MatbotError> {
        let table_names = self.connection.table_names().execute().await.map_err(|e| {
            MatbotError::Database(format!("Failed to list tables for drop: {}", e))
        })?;

        if table_names.contains(&self.table_name) {
            debug!("Dropping existing chunks table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| MatbotError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// Check that the chunks table exists and can be counted
    #[inline]
    pub async fn validate_integrity(&self) -> Result<bool, MatbotError> {
        debug!("Validating database integrity");

        let table_names = match self.connection.table_names().execute().await {
            Ok(names) => names,
            Err(e) => {
                error!("Failed to list tables during integrity check: {}", e);
                return Ok(false);
            }
        };

        if !table_names.contains(&self.table_name) {
            warn!("Chunks table missing during integrity check");
            return Ok(false);
        }

        match self.count_embeddings().await {
            Ok(count) => {
                debug!("Database integrity check passed, {} rows found", count);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to count rows during integrity check: {}", e);
                Ok(false)
            }
        }
    }
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray, MatbotError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| MatbotError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| MatbotError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b UInt32Array, MatbotError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| MatbotError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| MatbotError::Database(format!("Invalid {} column type", name)))
}
