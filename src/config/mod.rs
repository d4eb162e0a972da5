// Configuration management module
// TOML settings under the base directory plus the interactive setup flow

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GenerationConfig, OllamaConfig, RetrievalConfig, TAVILY_API_KEY_ENV,
    WebSearchConfig,
};

/// Get the default base directory path (`~/.matbot`)
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_base_dir()
}
