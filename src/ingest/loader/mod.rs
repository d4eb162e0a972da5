#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::embeddings::chunking::SourceDocument;

/// Loader selected for a file by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
    Markdown,
    Matlab,
}

impl FileKind {
    /// Classify a path by its (case-insensitive) extension
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "md" => Some(Self::Markdown),
            "m" => Some(Self::Matlab),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Matlab => "m",
        }
    }
}

impl fmt::Display for FileKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regular files directly inside `dir`, sorted by file name
#[inline]
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load the text units of one file, tagged with its file name.
///
/// Pages and files with no text after trimming are dropped, so an empty result means
/// nothing worth indexing was found.
#[inline]
pub fn load_file(path: &Path, kind: FileKind) -> Result<Vec<SourceDocument>> {
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Path has no file name: {}", path.display()))?;

    let units = match kind {
        FileKind::Pdf => load_pdf(path, &source)?,
        FileKind::Text | FileKind::Markdown | FileKind::Matlab => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            vec![SourceDocument {
                text,
                source,
                page: None,
            }]
        }
    };

    let units: Vec<SourceDocument> = units
        .into_iter()
        .filter(|unit| !unit.text.trim().is_empty())
        .collect();

    debug!("Loaded {} units from {}", units.len(), path.display());
    Ok(units)
}

fn load_pdf(path: &Path, source: &str) -> Result<Vec<SourceDocument>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read PDF: {}", path.display()))?;

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

    Ok(pages
        .into_iter()
        .zip(1_u32..)
        .map(|(text, page)| SourceDocument {
            text,
            source: source.to_string(),
            page: Some(page),
        })
        .collect())
}
