use super::*;
use crate::config::{OllamaConfig, RetrievalConfig, WebSearchConfig};
use crate::database::lancedb::{EmbeddingRecord, StoredChunk};
use crate::llm::prompt::WEB_CONTEXT_HEADER;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct EmbedResponder;

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let count = body["input"].as_array().map_or(0, Vec::len);
        let embeddings = vec![vec![1.0_f32, 0.0, 0.0, 0.0]; count];
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

async fn ollama_server(generated: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EmbedResponder)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral:7b-instruct",
            "response": generated,
            "done": true
        })))
        .mount(&server)
        .await;
    server
}

fn config_for(ollama: &MockServer, web: &MockServer, base_dir: &TempDir, top_k: usize) -> Config {
    let address = ollama.address();
    Config {
        base_dir: base_dir.path().to_path_buf(),
        ollama: OllamaConfig {
            host: address.ip().to_string(),
            port: address.port(),
            embedding_dimension: 4,
            ..OllamaConfig::default()
        },
        retrieval: RetrievalConfig { top_k },
        web: WebSearchConfig {
            tavily_api_key: Some("tvly-test".to_string()),
            tavily_endpoint: format!("{}/search", web.uri()),
            wikipedia_endpoint: format!("{}/w/api.php", web.uri()),
            ..WebSearchConfig::default()
        },
        ..Config::default()
    }
}

async fn seed_index(config: &Config, count: u32) -> Result<()> {
    let mut store = VectorStore::new(config).await?;
    let records = (0..count)
        .map(|i| EmbeddingRecord {
            id: format!("chunk-{i}"),
            vector: vec![1.0, i as f32, 0.0, 0.0],
            chunk: StoredChunk {
                source: format!("doc{}.pdf", i % 3),
                page: Some(i + 1),
                chunk_index: i,
                content: format!("Documentation passage number {i}."),
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
        })
        .collect();
    store.store_embeddings_batch(records).await?;
    Ok(())
}

async fn sent_prompts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/api/generate")
        .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
        .filter_map(|body| body["prompt"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn retrieve_respects_top_k() -> Result<()> {
    let ollama = ollama_server("unused").await;
    let web = MockServer::start().await;
    let base_dir = TempDir::new()?;
    let config = config_for(&ollama, &web, &base_dir, 3);
    seed_index(&config, 8).await?;

    let pipeline = RagPipeline::new(config).await?;
    let results = pipeline.retrieve("How do I create a vector?").await?;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| !r.chunk.source.is_empty()));
    assert_eq!(results[0].chunk.chunk_index, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn answer_without_web_makes_no_web_requests() -> Result<()> {
    let ollama = ollama_server("[INST] echo [/INST]  Use the colon operator: `1:10`.  ").await;
    let web = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&web)
        .await;

    let base_dir = TempDir::new()?;
    let config = config_for(&ollama, &web, &base_dir, 2);
    seed_index(&config, 4).await?;

    let pipeline = RagPipeline::new(config).await?;
    let response = pipeline.answer("How do I make a range?", false).await?;

    assert_eq!(response.answer, "Use the colon operator: `1:10`.");
    assert_eq!(response.citations.len(), 2);
    assert_eq!(response.citations[0].source, "doc0.pdf");
    assert_eq!(response.citations[0].page, Some(1));
    assert!(!response.used_web_context);

    let prompts = sent_prompts(&ollama).await;
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains(WEB_CONTEXT_HEADER));
    assert!(prompts[0].contains("Documentation passage number 0."));
    assert!(prompts[0].contains("How do I make a range?"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn answer_with_web_context() -> Result<()> {
    let ollama = ollama_server("Plot with plot(x, y).").await;
    let web = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"search": [{"ns": 0, "title": "MATLAB", "pageid": 20412}]}
        })))
        .mount(&web)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("prop", "extracts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"pages": [{"pageid": 20412, "title": "MATLAB", "extract": "MATLAB is a numeric computing environment."}]}
        })))
        .mount(&web)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"title": "plot", "url": "https://example.com/plot", "content": "plot draws 2-D lines."}]
        })))
        .expect(1)
        .mount(&web)
        .await;

    let base_dir = TempDir::new()?;
    let config = config_for(&ollama, &web, &base_dir, 2);
    seed_index(&config, 2).await?;

    let pipeline = RagPipeline::new(config).await?;
    let response = pipeline.answer("How do I plot?", true).await?;

    assert_eq!(response.answer, "Plot with plot(x, y).");
    assert!(response.used_web_context);

    let prompts = sent_prompts(&ollama).await;
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains(WEB_CONTEXT_HEADER));
    let wiki = prompt
        .find("MATLAB is a numeric computing environment.")
        .expect("wikipedia text in prompt");
    let tavily = prompt
        .find("From https://example.com/plot:\nplot draws 2-D lines.")
        .expect("tavily text in prompt");
    assert!(wiki < tavily);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_web_sources_give_plain_prompt() -> Result<()> {
    let ollama = ollama_server("Answer.").await;
    let web = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&web)
        .await;

    let base_dir = TempDir::new()?;
    let config = config_for(&ollama, &web, &base_dir, 1);
    seed_index(&config, 1).await?;

    let pipeline = RagPipeline::new(config).await?;
    let response = pipeline.answer("What is MATLAB?", true).await?;

    assert_eq!(response.answer, "Answer.");
    assert!(!response.used_web_context);
    assert!(!sent_prompts(&ollama).await[0].contains(WEB_CONTEXT_HEADER));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn html_code_blocks_are_rendered() -> Result<()> {
    let ollama = ollama_server("Try:\n```matlab\nx = 1:10;\n```").await;
    let web = MockServer::start().await;
    let base_dir = TempDir::new()?;
    let mut config = config_for(&ollama, &web, &base_dir, 1);
    config.generation.html_code_blocks = true;
    seed_index(&config, 1).await?;

    let pipeline = RagPipeline::new(config).await?;
    let response = pipeline.answer("Range?", false).await?;

    assert!(response.answer.contains("<pre>"));
    assert!(response.answer.contains("</pre>"));
    assert!(!response.answer.contains("```"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_index_still_answers() -> Result<()> {
    let ollama = ollama_server("I could not find documentation for that.").await;
    let web = MockServer::start().await;
    let base_dir = TempDir::new()?;
    let config = config_for(&ollama, &web, &base_dir, 5);

    let pipeline = RagPipeline::new(config).await?;
    let response = pipeline.answer("Anything?", false).await?;

    assert!(response.citations.is_empty());
    assert_eq!(response.answer, "I could not find documentation for that.");
    Ok(())
}
