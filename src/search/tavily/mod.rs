
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{SearchProvider, WebSnippet};
use crate::http::{agent_with_timeout, request_with_retry};

const TAVILY_TIMEOUT_SECONDS: u64 = 30;

/// Tavily search API client
#[derive(Debug, Clone)]
pub struct TavilyClient {
    endpoint: Url,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    #[inline]
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid Tavily endpoint: {endpoint}"))?;

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            agent: agent_with_timeout(Duration::from_secs(TAVILY_TIMEOUT_SECONDS)),
        })
    }
}

impl SearchProvider for TavilyClient {
    fn name(&self) -> &'static str {
        "Tavily"
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSnippet>> {
        debug!("Searching Tavily for {:?} (limit {})", query, limit);

        let request_json = serde_json::to_string(&TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            include_answer: false,
            max_results: limit,
        })
        .context("Failed to serialize Tavily request")?;

        let response_text = request_with_retry(self.endpoint.as_str(), 1, || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Tavily request failed")?;

        let response: TavilyResponse =
            serde_json::from_str(&response_text).context("Failed to parse Tavily response")?;

        Ok(response
            .results
            .into_iter()
            .take(limit)
            .map(|r| WebSnippet {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }

    fn format_snippet(&self, snippet: &WebSnippet) -> String {
        format!("From {}:\n{}", snippet.url, snippet.content)
    }
}
