// Text extraction from files attached to a question

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::llm::GenerationClient;

/// Separator placed between a question and the text pulled from its attachment
pub const ATTACHMENT_CONTEXT_MARKER: &str = "\n\nContext from uploaded file:\n";

const BINARY_MATLAB_MESSAGE: &str = "Unable to read binary MATLAB file content.";
const UNSUPPORTED_MESSAGE: &str = "Unsupported file type.";

/// Something that can read the text out of an image
pub trait ImageReader {
    fn read_text(&self, image: &[u8]) -> Result<String>;
}

impl ImageReader for GenerationClient {
    #[inline]
    fn read_text(&self, image: &[u8]) -> Result<String> {
        self.describe_image(image)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Image { text: String },
    MatlabSource { content: String },
    /// A `.m`/`.mat` file that is not valid UTF-8
    BinaryMatlab,
    Unsupported,
}

impl Attachment {
    /// Text appended to the question for this attachment
    #[inline]
    pub fn to_context(&self) -> String {
        match self {
            Self::Image { text } => format!("IMAGE CONTENT:\n{}", text),
            Self::MatlabSource { content } => format!("MATLAB FILE CONTENT:\n{}", content),
            Self::BinaryMatlab => BINARY_MATLAB_MESSAGE.to_string(),
            Self::Unsupported => UNSUPPORTED_MESSAGE.to_string(),
        }
    }
}

/// Extract the text of an attached file.
///
/// An unknown extension is reported as [`Attachment::Unsupported`] rather than an error.
#[inline]
pub fn process_attachment<R: ImageReader>(path: &Path, reader: &R) -> Result<Attachment> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let attachment = match extension.as_str() {
        "png" | "jpg" | "jpeg" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image: {}", path.display()))?;
            info!("Reading text from image {}", path.display());
            let text = reader
                .read_text(&bytes)
                .with_context(|| format!("Failed to read text from {}", path.display()))?;
            Attachment::Image { text }
        }
        "m" | "mat" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read MATLAB file: {}", path.display()))?;
            match String::from_utf8(bytes) {
                Ok(content) => Attachment::MatlabSource { content },
                Err(_) => Attachment::BinaryMatlab,
            }
        }
        _ => Attachment::Unsupported,
    };

    debug!("Processed attachment {}: {:?}", path.display(), attachment);
    Ok(attachment)
}

#[inline]
pub fn combine_with_query(query: &str, context: &str) -> String {
    format!("{}{}{}", query, ATTACHMENT_CONTEXT_MARKER, context)
}

/// The part of an input shown back to the user, without attachment context
#[inline]
pub fn display_text(input: &str) -> &str {
    let marker = ATTACHMENT_CONTEXT_MARKER.trim_end_matches('\n');
    input.split_once(marker).map_or(input, |(question, _)| question)
}
