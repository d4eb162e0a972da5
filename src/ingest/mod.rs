// Directory ingestion: load, split, embed and persist a documentation corpus


pub mod loader;

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::lancedb::{EmbeddingRecord, VectorStore};
use crate::database::sqlite::{Database, DocumentStatus, NewDocument, NewIngestionRun};
use crate::embeddings::chunking::{DocumentChunk, SourceDocument, split_documents};
use crate::embeddings::ollama::OllamaClient;

pub use loader::{FileKind, list_files, load_file};

/// Counts reported after an ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub units_loaded: usize,
    pub chunks_created: usize,
}

/// Outcome of loading one supported file
struct LoadedFile {
    source: String,
    kind: FileKind,
    units: Vec<SourceDocument>,
    error: Option<String>,
}

pub struct Ingestor {
    config: Config,
    database: Database,
    vector_store: VectorStore,
    ollama_client: OllamaClient,
    show_progress: bool,
}

impl Ingestor {
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let database = Database::initialize(&config)
            .await
            .context("Failed to initialize SQLite catalog")?;

        let vector_store = VectorStore::new(&config)
            .await
            .context("Failed to initialize LanceDB vector store")?;

        let ollama_client =
            OllamaClient::new(&config).context("Failed to initialize Ollama client")?;

        Ok(Self {
            config,
            database,
            vector_store,
            ollama_client,
            show_progress: console::user_attended_stderr(),
        })
    }

    /// Hide progress bars even when stderr is a terminal
    #[inline]
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    /// Replace the index with the contents of `dir`.
    ///
    /// The vector table, the chunk dump and the catalog are all rebuilt, so running this
    /// twice over the same directory leaves the same number of chunks behind.
    #[inline]
    pub async fn ingest_directory(&mut self, dir: &Path) -> Result<IngestionReport> {
        let started_date = Utc::now().naive_utc();
        info!("Ingesting documents from {}", dir.display());

        let files = list_files(dir)?;
        let mut report = IngestionReport {
            files_seen: files.len(),
            ..IngestionReport::default()
        };

        let bar = self.progress_bar(files.len() as u64, "{spinner} [{pos}/{len}] Loading {msg}");
        let mut loaded = Vec::new();
        for path in &files {
            bar.set_message(path.display().to_string());
            match FileKind::from_path(path) {
                Some(kind) => loaded.push(Self::load(path, kind)),
                None => {
                    debug!("Skipping unsupported file {}", path.display());
                    report.files_skipped += 1;
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        let units: Vec<SourceDocument> = loaded
            .iter()
            .flat_map(|file| file.units.iter().cloned())
            .collect();
        report.units_loaded = units.len();

        let chunks = split_documents(&units, &self.config.chunking)?;
        report.chunks_created = chunks.len();
        info!(
            "Split {} units into {} chunks",
            report.units_loaded, report.chunks_created
        );

        // Nothing on disk changes until every chunk has an embedding
        let records = self.embed_chunks(&chunks)?;
        self.vector_store
            .reset()
            .await
            .context("Failed to reset vector table")?;
        if !records.is_empty() {
            self.vector_store
                .store_embeddings_batch(records)
                .await
                .context("Failed to store embeddings")?;
        }
        self.write_chunk_dump(&chunks)?;

        let mut chunk_counts: HashMap<&str, i64> = HashMap::new();
        for chunk in &chunks {
            *chunk_counts.entry(chunk.metadata.source.as_str()).or_default() += 1;
        }

        self.database.clear_documents().await?;
        for file in &loaded {
            let chunk_count = chunk_counts.get(file.source.as_str()).copied().unwrap_or(0);
            let status = match (&file.error, chunk_count) {
                (Some(_), _) => DocumentStatus::Failed,
                (None, 0) => DocumentStatus::Skipped,
                (None, _) => DocumentStatus::Indexed,
            };

            if status == DocumentStatus::Indexed {
                report.files_indexed += 1;
            } else {
                report.files_skipped += 1;
            }

            self.database
                .record_document(&NewDocument {
                    source: file.source.clone(),
                    file_type: file.kind.to_string(),
                    unit_count: file.units.len() as i64,
                    chunk_count,
                    status,
                    error_message: file.error.clone(),
                })
                .await?;
        }

        self.database
            .record_run(&NewIngestionRun {
                directory: dir.display().to_string(),
                files_seen: report.files_seen as i64,
                files_indexed: report.files_indexed as i64,
                chunks_created: report.chunks_created as i64,
                started_date,
            })
            .await?;

        info!(
            "Ingestion finished: {} files seen, {} indexed, {} skipped, {} chunks",
            report.files_seen, report.files_indexed, report.files_skipped, report.chunks_created
        );
        Ok(report)
    }

    fn load(path: &Path, kind: FileKind) -> LoadedFile {
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match load_file(path, kind) {
            Ok(units) => {
                if units.is_empty() {
                    warn!("No text extracted from {}, skipping", path.display());
                } else {
                    info!("Loaded {} ({} units)", source, units.len());
                }
                LoadedFile {
                    source,
                    kind,
                    units,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", path.display(), e);
                LoadedFile {
                    source,
                    kind,
                    units: Vec::new(),
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }

    fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<EmbeddingRecord>> {
        let mut records = Vec::with_capacity(chunks.len());
        if chunks.is_empty() {
            return Ok(records);
        }

        let batch_size = self.config.ollama.batch_size.max(1) as usize;
        let bar = self.progress_bar(chunks.len() as u64, "{bar:40} [{pos}/{len}] Embedding chunks");

        for batch in chunks.chunks(batch_size) {
            let embeddings = self.ollama_client.generate_chunk_embeddings(batch)?;
            records.extend(
                batch
                    .iter()
                    .zip(embeddings)
                    .map(|(chunk, result)| EmbeddingRecord::from_chunk(chunk, result.embedding)),
            );
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        Ok(records)
    }

    fn write_chunk_dump(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let path = self.config.chunk_dump_path();
        let json = serde_json::to_string_pretty(chunks).context("Failed to serialize chunks")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write chunk dump: {}", path.display()))?;
        debug!("Wrote {} chunks to {}", chunks.len(), path.display());
        Ok(())
    }

    fn progress_bar(&self, len: u64, template: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len).with_style(style)
    }
}
