// Optional web and Wikipedia context for questions


pub mod tavily;
pub mod wikipedia;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::WebSearchConfig;

pub use tavily::TavilyClient;
pub use wikipedia::WikipediaClient;

/// One search hit with the text handed to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSnippet {
    pub title: String,
    pub url: String,
    pub content: String,
}

pub trait SearchProvider {
    fn name(&self) -> &'static str;

    fn search(&self, query: &str, limit: usize) -> Result<Vec<WebSnippet>>;

    /// How one snippet is introduced in the prompt
    fn format_snippet(&self, snippet: &WebSnippet) -> String;
}

/// Web and Wikipedia search, queried together for one question
#[derive(Debug, Clone)]
pub struct WebContext {
    wikipedia: WikipediaClient,
    tavily: Option<TavilyClient>,
    max_web_results: usize,
    max_wiki_docs: usize,
}

impl WebContext {
    #[inline]
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let tavily = match config.api_key() {
            Some(key) => Some(TavilyClient::new(&config.tavily_endpoint, key)?),
            None => None,
        };

        Ok(Self {
            wikipedia: WikipediaClient::new(&config.wikipedia_endpoint)?,
            tavily,
            max_web_results: config.max_web_results,
            max_wiki_docs: config.max_wiki_docs,
        })
    }

    /// Search both sources and join whatever came back.
    ///
    /// Wikipedia comes first. A source that fails or returns nothing contributes no text;
    /// this never fails.
    #[inline]
    pub fn gather(&self, query: &str) -> String {
        info!("Performing web search for additional context");

        let wiki_context = collect(&self.wikipedia, query, self.max_wiki_docs);

        let web_context = match &self.tavily {
            Some(tavily) => collect(tavily, query, self.max_web_results),
            None => {
                warn!("No Tavily API key configured, skipping web search");
                String::new()
            }
        };

        [wiki_context, web_context]
            .into_iter()
            .filter(|block| !block.is_empty())
            .join("\n\n")
    }
}

fn collect<P: SearchProvider>(provider: &P, query: &str, limit: usize) -> String {
    match provider.search(query, limit) {
        Ok(snippets) => {
            info!("{} returned {} results", provider.name(), snippets.len());
            snippets
                .iter()
                .filter(|s| !s.content.trim().is_empty())
                .map(|s| provider.format_snippet(s))
                .join("\n\n")
        }
        Err(e) => {
            warn!("{} search error: {:#}", provider.name(), e);
            String::new()
        }
    }
}
