#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with the default models pulled
// Run with: cargo test --test integration_ollama -- --ignored

use matbot::config::{Config, OllamaConfig};
use matbot::embeddings::ollama::OllamaClient;
use matbot::llm::{GenerationClient, extract_answer, format_prompt};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn integration_config() -> Config {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);

    Config {
        ollama: OllamaConfig {
            host,
            port,
            batch_size: 5,
            ..OllamaConfig::default()
        },
        ..Config::default()
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = OllamaClient::new(&integration_config()).expect("can create client");
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_embeddings() {
    init_test_tracing();

    let config = integration_config();
    let client = OllamaClient::new(&config)
        .expect("can create client")
        .with_timeout(Duration::from_secs(60));

    let texts = vec![
        "zeros(3) creates a 3-by-3 matrix of zeros.".to_string(),
        "Use a for loop to iterate over array elements.".to_string(),
    ];
    let results = client
        .generate_embeddings_batch(&texts)
        .expect("embeddings are generated");

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(
            result.embedding.len(),
            config.ollama.embedding_dimension as usize
        );
    }
    info!("Generated {} embeddings", results.len());
}

#[test]
#[ignore = "requires a local Ollama instance with the generation model"]
fn real_ollama_generation() {
    init_test_tracing();

    let client = GenerationClient::new(&integration_config()).expect("can create client");
    let prompt = format_prompt(
        "How do I create a row vector from 1 to 5?",
        &["The colon operator a:b creates the row vector a, a+1, ..., b."],
        "",
    );

    let generated = client.generate(&prompt).expect("generation succeeds");
    let answer = extract_answer(&generated);

    assert!(!answer.is_empty());
    info!("Answer: {}", answer);
}
