use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ToolSettings;
use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;
use crate::registry::ToolExecutor;

/// Web search over a Tavily-style search API.
pub struct SearchInternet {
    client: Client,
    settings: ToolSettings,
    definition: Tool,
}

#[derive(Deserialize)]
struct Args {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    5
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl SearchInternet {
    pub fn new(client: Client, settings: ToolSettings) -> Self {
        let definition = Tool::new(
            "search_internet",
            "Search the internet for up-to-date information. \
             Returns a list of result titles, URLs, and content snippets.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query."
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return. Defaults to 5."
                    }
                }
            }),
        );
        Self {
            client,
            settings,
            definition,
        }
    }
}

#[async_trait]
impl ToolExecutor for SearchInternet {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let url = format!("{}/search", self.settings.search_host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "api_key": self.settings.search_api_key,
                "query": args.query,
                "max_results": args.max_results,
            }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "search request failed: {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if body.results.is_empty() {
            return Ok(format!("No search results for '{}'.", args.query));
        }

        let mut lines = Vec::new();
        for (i, result) in body.results.iter().take(args.max_results).enumerate() {
            lines.push(format!(
                "{}. {} ({})\n{}",
                i + 1,
                result.title,
                result.url,
                result.content
            ));
        }
        Ok(lines.join("\n\n"))
    }
}
