//! `WebSearch`: SerpAPI-backed web search.
//!
//! Whether search is usable is decided once at construction: without an
//! API key every call answers with a fixed "unavailable" message and never
//! touches the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::SearchConfig;
use crate::tools::{Tool, ToolMeta};

const UNAVAILABLE: &str = "Web search is currently unavailable. Please configure a search API key.";
const NO_RESULT: &str = "No good search result found";

struct Credentials {
    endpoint: String,
    engine: String,
    api_key: String,
}

pub struct SearchTool {
    backend: Option<Credentials>,
    client: Client,
}

impl SearchTool {
    pub fn new(endpoint: impl Into<String>, engine: impl Into<String>, api_key: Option<String>) -> Self {
        let backend = api_key.map(|api_key| Credentials {
            endpoint: endpoint.into(),
            engine: engine.into(),
            api_key,
        });
        if backend.is_none() {
            tracing::info!("no search API key configured; WebSearch disabled");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "search HTTP client fell back to defaults");
                Client::new()
            });
        Self { backend, client }
    }

    pub fn from_config(cfg: &SearchConfig) -> Self {
        Self::new(cfg.endpoint.clone(), cfg.engine.clone(), cfg.api_key.clone())
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn search(&self, query: &str) -> String {
        let Some(backend) = &self.backend else {
            return UNAVAILABLE.to_string();
        };
        let result = self
            .client
            .get(&backend.endpoint)
            .query(&[
                ("engine", backend.engine.as_str()),
                ("q", query.trim()),
                ("api_key", backend.api_key.as_str()),
            ])
            .send()
            .await;
        let body = match result {
            Ok(resp) => resp.json::<Value>().await,
            Err(e) => Err(e),
        };
        match body {
            Ok(body) => extract_answer(&body),
            Err(e) => {
                tracing::warn!(error = %e, "search request failed");
                format!("Search failed: {e}")
            }
        }
    }
}

fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Pick the most useful text out of a SerpAPI response.
pub fn extract_answer(body: &Value) -> String {
    if let Some(err) = non_empty_str(&body["error"]) {
        return format!("Search failed: {err}");
    }

    let answer_box = &body["answer_box"];
    let direct = non_empty_str(&answer_box["answer"])
        .or_else(|| non_empty_str(&answer_box["snippet"]))
        .or_else(|| non_empty_str(&answer_box["snippet_highlighted_words"][0]))
        .or_else(|| non_empty_str(&body["knowledge_graph"]["description"]));
    if let Some(text) = direct {
        return text.to_string();
    }

    let snippets: Vec<&str> = body["organic_results"]
        .as_array()
        .map(|results| results.iter().filter_map(|r| non_empty_str(&r["snippet"])).collect())
        .unwrap_or_default();
    if snippets.is_empty() {
        NO_RESULT.to_string()
    } else {
        snippets.join("\n")
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta {
            name: "WebSearch".into(),
            description: "Useful for when you need to find information from the internet. \
                          Input should be a search query."
                .into(),
        }
    }

    async fn invoke(&self, input: &str) -> String {
        self.search(input).await
    }
}
