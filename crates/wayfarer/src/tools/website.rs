use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;
use crate::registry::ToolExecutor;

/// Cap on returned page text; keeps one page from flooding the context.
const MAX_CONTENT_CHARS: usize = 8000;

/// Fetch a web page and return its readable text.
pub struct ReadWebsite {
    client: Client,
    definition: Tool,
    script_re: Regex,
    tag_re: Regex,
    whitespace_re: Regex,
}

#[derive(Deserialize)]
struct Args {
    url: String,
}

impl ReadWebsite {
    pub fn new(client: Client) -> Self {
        let definition = Tool::new(
            "read_website",
            "Fetch a web page and return its text content with markup removed. \
             Useful for reading articles, menus, and reviews found via search.",
            json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The absolute URL of the page to read."
                    }
                }
            }),
        );
        Self {
            client,
            definition,
            script_re: Regex::new(r"(?si)<(script|style|noscript)\b.*?</(script|style|noscript)>")
                .expect("static regex"),
            tag_re: Regex::new(r"(?s)<[^>]+>").expect("static regex"),
            whitespace_re: Regex::new(r"\s+").expect("static regex"),
        }
    }

    fn strip_markup(&self, html: &str) -> String {
        let without_scripts = self.script_re.replace_all(html, " ");
        let without_tags = self.tag_re.replace_all(&without_scripts, " ");
        let collapsed = self.whitespace_re.replace_all(&without_tags, " ");
        let text = collapsed.trim();
        match text.char_indices().nth(MAX_CONTENT_CHARS) {
            Some((index, _)) => text[..index].to_string(),
            None => text.to_string(),
        }
    }
}

#[async_trait]
impl ToolExecutor for ReadWebsite {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let response = self
            .client
            .get(&args.url)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "fetching {} failed: {}",
                args.url,
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let text = self.strip_markup(&html);
        if text.is_empty() {
            Ok(format!("The page at {} has no readable text.", args.url))
        } else {
            Ok(text)
        }
    }
}
