
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Separators tried in order, from paragraph breaks down to single characters
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// One loaded unit of a source file: a PDF page or a whole text file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub text: String,
    /// File name the unit was loaded from
    pub source: String,
    /// 1-based page number for paged formats
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Position of the chunk in its ingestion run
    #[serde(default)]
    pub chunk_index: usize,
}

/// A chunk of text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Configuration for text splitting, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Upper bound on the text shared by adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 192,
        }
    }
}

/// Recursive character splitter.
///
/// Text is cut on the first separator that occurs in it, separators stay attached to the
/// start of the following piece, and pieces longer than the chunk size are split again
/// with the remaining separators. Small pieces are merged back together into chunks of at
/// most `chunk_size` characters, carrying up to `chunk_overlap` characters of the previous
/// chunk.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            bail!("Chunk size must be greater than 0");
        }
        if config.chunk_overlap >= config.chunk_size {
            bail!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap,
                config.chunk_size
            );
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    #[inline]
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Split one unit of text into trimmed, non-empty chunks
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece.trim().to_string());
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks.retain(|chunk| !chunk.is_empty());
        final_chunks
    }

    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                push_joined(&current, &mut chunks);

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_joined(&current, &mut chunks);
        chunks
    }
}

/// Split every document and number the resulting chunks in order.
///
/// Chunks never span two documents.
#[inline]
pub fn split_documents(
    documents: &[SourceDocument],
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>> {
    let splitter = TextSplitter::new(config)?;
    let mut chunks = Vec::new();

    for document in documents {
        for content in splitter.split_text(&document.text) {
            let chunk_index = chunks.len();
            chunks.push(DocumentChunk {
                content,
                metadata: ChunkMetadata {
                    source: document.source.clone(),
                    page: document.page,
                    chunk_index,
                },
            });
        }
    }

    debug!(
        "Split {} documents into {} chunks (avg {} characters)",
        documents.len(),
        chunks.len(),
        chunks.iter().map(|c| char_len(&c.content)).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Split `text` on `separator`, keeping each separator at the start of the piece after it
fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn push_joined(pieces: &VecDeque<&str>, chunks: &mut Vec<String>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
