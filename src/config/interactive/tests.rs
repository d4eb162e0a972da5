use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert!(config.ollama.batch_size > 0);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn load_existing_config_falls_back_on_broken_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[ollama\nport = ")
        .expect("should write config");

    let config = load_existing_config_impl(temp_dir.path()).expect("defaults are used");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn unreachable_ollama_reports_failure() {
    let ollama = crate::config::OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..crate::config::OllamaConfig::default()
    };
    assert!(!super::test_ollama_connection(&ollama));
}
