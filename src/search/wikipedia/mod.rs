#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{SearchProvider, WebSnippet};
use crate::http::{agent_with_timeout, request_with_retry};

/// Longest article text kept per page, in characters
pub const MAX_ARTICLE_CHARS: usize = 4000;

const WIKIPEDIA_TIMEOUT_SECONDS: u64 = 30;
const USER_AGENT: &str = concat!("matbot/", env!("CARGO_PKG_VERSION"));

/// MediaWiki action API client: title search followed by plain-text extracts
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    endpoint: Url,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    pageid: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: ExtractQuery,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    title: String,
    #[serde(default)]
    extract: String,
}

impl WikipediaClient {
    #[inline]
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid Wikipedia endpoint: {endpoint}"))?;

        Ok(Self {
            endpoint,
            agent: agent_with_timeout(Duration::from_secs(WIKIPEDIA_TIMEOUT_SECONDS)),
        })
    }

    /// Public article URL for a page title
    #[inline]
    pub fn article_url(&self, title: &str) -> String {
        let path = format!("/wiki/{}", title.replace(' ', "_"));
        self.endpoint
            .join(&path)
            .map_or_else(|_| path.clone(), |url| url.to_string())
    }

    fn get(&self, params: &[(&str, &str)]) -> Result<String> {
        request_with_retry(self.endpoint.as_str(), 1, || {
            self.agent
                .get(self.endpoint.as_str())
                .header("User-Agent", USER_AGENT)
                .query_pairs(params.iter().copied())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let limit = limit.to_string();
        let response_text = self
            .get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
                ("format", "json"),
            ])
            .context("Wikipedia search failed")?;

        let response: SearchResponse = serde_json::from_str(&response_text)
            .context("Failed to parse Wikipedia search response")?;

        Ok(response.query.search)
    }

    fn load_extract(&self, page_id: u64) -> Result<Option<ExtractPage>> {
        let page_id = page_id.to_string();
        let response_text = self
            .get(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("pageids", &page_id),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .context("Wikipedia extract request failed")?;

        let response: ExtractResponse = serde_json::from_str(&response_text)
            .context("Failed to parse Wikipedia extract response")?;

        Ok(response.query.pages.into_iter().next())
    }
}

impl SearchProvider for WikipediaClient {
    fn name(&self) -> &'static str {
        "Wikipedia"
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSnippet>> {
        debug!("Searching Wikipedia for {:?} (limit {})", query, limit);

        let hits = self.search_titles(query, limit)?;
        let mut snippets = Vec::with_capacity(hits.len());

        for hit in hits.into_iter().take(limit) {
            match self.load_extract(hit.pageid) {
                Ok(Some(page)) => snippets.push(WebSnippet {
                    url: self.article_url(&page.title),
                    title: page.title,
                    content: truncate_chars(page.extract.trim(), MAX_ARTICLE_CHARS),
                }),
                Ok(None) => debug!("No extract for Wikipedia page {}", hit.title),
                Err(e) => warn!("Skipping Wikipedia page {}: {:#}", hit.title, e),
            }
        }

        Ok(snippets)
    }

    fn format_snippet(&self, snippet: &WebSnippet) -> String {
        format!("From Wikipedia ({}):\n{}", snippet.url, snippet.content)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
