use super::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_search(server: &MockServer, hits: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": "",
            "query": {"searchinfo": {"totalhits": 2}, "search": hits}
        })))
        .mount(server)
        .await;
}

async fn mount_extract(server: &MockServer, page_id: &str, title: &str, extract: &str) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("prop", "extracts"))
        .and(query_param("pageids", page_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": true,
            "query": {"pages": [{"pageid": 1, "ns": 0, "title": title, "extract": extract}]}
        })))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> WikipediaClient {
    WikipediaClient::new(&format!("{}/w/api.php", server.uri())).expect("client")
}

#[test]
fn truncation_counts_characters() {
    assert_eq!(truncate_chars("héllo", 2), "hé");
    assert_eq!(truncate_chars("abc", 10), "abc");
    assert_eq!(truncate_chars("", 3), "");
}

#[test]
fn article_urls_use_underscores() {
    let client = WikipediaClient::new("https://en.wikipedia.org/w/api.php").expect("client");
    assert_eq!(
        client.article_url("MATLAB"),
        "https://en.wikipedia.org/wiki/MATLAB"
    );
    assert_eq!(
        client.article_url("Fast Fourier transform"),
        "https://en.wikipedia.org/wiki/Fast_Fourier_transform"
    );
}

#[tokio::test]
async fn search_then_load_extracts() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!([
            {"ns": 0, "title": "MATLAB", "pageid": 20412},
            {"ns": 0, "title": "Simulink", "pageid": 3309}
        ]),
    )
    .await;
    mount_extract(&server, "20412", "MATLAB", "MATLAB is a numeric computing environment.").await;
    mount_extract(&server, "3309", "Simulink", &"S".repeat(5000)).await;

    let client = client_for(&server);
    let snippets = tokio::task::spawn_blocking(move || client.search("matlab", 2))
        .await
        .expect("task joins")
        .expect("search succeeds");

    assert_eq!(snippets.len(), 2);
    assert_eq!(snippets[0].title, "MATLAB");
    assert_eq!(snippets[0].content, "MATLAB is a numeric computing environment.");
    assert!(snippets[0].url.ends_with("/wiki/MATLAB"));
    assert_eq!(snippets[1].content.chars().count(), MAX_ARTICLE_CHARS);
}

#[tokio::test]
async fn failed_extract_skips_page() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        json!([
            {"ns": 0, "title": "MATLAB", "pageid": 20412},
            {"ns": 0, "title": "Broken", "pageid": 7}
        ]),
    )
    .await;
    mount_extract(&server, "20412", "MATLAB", "Matrix laboratory.").await;
    Mock::given(method("GET"))
        .and(query_param("pageids", "7"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let snippets = tokio::task::spawn_blocking(move || client.search("matlab", 2))
        .await
        .expect("task joins")
        .expect("search succeeds");

    assert_eq!(snippets.len(), 1);
    assert_eq!(snippets[0].content, "Matrix laboratory.");
}

#[test]
fn snippet_format() {
    let client = WikipediaClient::new("https://en.wikipedia.org/w/api.php").expect("client");
    let snippet = WebSnippet {
        title: "MATLAB".to_string(),
        url: "https://en.wikipedia.org/wiki/MATLAB".to_string(),
        content: "Matrix laboratory.".to_string(),
    };

    assert_eq!(
        client.format_snippet(&snippet),
        "From Wikipedia (https://en.wikipedia.org/wiki/MATLAB):\nMatrix laboratory."
    );
}
