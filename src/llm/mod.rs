// Prompt construction and Ollama text generation

pub mod ollama;
pub mod prompt;

pub use ollama::GenerationClient;
pub use prompt::{extract_answer, format_prompt, render_code_blocks};
