//! Web search tool backed by the `DuckDuckGo` Instant Answer API

use super::{parse_args, ParameterKind, ToolArgs, ToolError, ToolHandler, ToolSpec};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";
const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_CAP: usize = 10;

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct SearchResult {
    title: String,
    snippet: String,
    url: String,
}

impl WebSearchTool {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jarvis/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "web_search",
            "Search the internet for real-time information, news, and facts.",
        )
        .required("query", ParameterKind::String, "What to search for")
        .optional(
            "max_results",
            ParameterKind::Integer,
            "Maximum number of results to return (default 5)",
        )
    }

    async fn fetch(&self, query: &str) -> Result<InstantAnswer, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("An error occurred while searching: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Execution(format!(
                "An error occurred while searching: HTTP {status}"
            )));
        }

        response
            .json::<InstantAnswer>()
            .await
            .map_err(|e| ToolError::Execution(format!("Unreadable search response: {e}")))
    }
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let input: WebSearchInput = parse_args(args)?;
        let query = input.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".to_string()));
        }
        let limit = input
            .max_results
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_CAP);

        tracing::info!(query = %query, limit, "Running web search");
        let answer = self.fetch(query).await?;
        let results = collect_results(answer, limit);

        if results.is_empty() {
            return Ok(format!("No results found for '{query}'."));
        }
        Ok(format_results(&results))
    }
}

// DuckDuckGo Instant Answer response

#[derive(Debug, Default, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Other(IgnoredAny),
}

fn collect_results(answer: InstantAnswer, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if !answer.abstract_text.is_empty() {
        results.push(SearchResult {
            title: answer.heading,
            snippet: answer.abstract_text,
            url: answer.abstract_url,
        });
    }

    let mut pending: Vec<RelatedTopic> = answer.related_topics;
    pending.reverse();
    while let Some(topic) = pending.pop() {
        if results.len() >= limit {
            break;
        }
        match topic {
            RelatedTopic::Topic { text, first_url } => {
                let (title, snippet) = match text.split_once(" - ") {
                    Some((title, snippet)) => (title.to_string(), snippet.to_string()),
                    None => (text.clone(), String::new()),
                };
                results.push(SearchResult {
                    title,
                    snippet,
                    url: first_url,
                });
            }
            RelatedTopic::Group { topics } => pending.extend(topics.into_iter().rev()),
            RelatedTopic::Other(_) => {}
        }
    }

    results.truncate(limit);
    results
}

fn format_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "{}. {}", i + 1, r.title);
        if !r.snippet.is_empty() {
            let _ = write!(out, "\n   {}", r.snippet);
        }
        if !r.url.is_empty() {
            let _ = write!(out, "\n   URL: {}", r.url);
        }
    }
    out
}
