//! Streamed chat completions against the Anthropic Messages API.

use std::collections::HashMap;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::base::{ModelEvent, ModelStream, Provider};
use crate::errors::{AssistantError, AssistantResult};
use crate::models::{Message, MessageContent, Role, Tool, ToolCall};

pub const ANTHROPIC_DEFAULT_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: i32,
}

impl AnthropicConfig {
    pub fn new<S: Into<String>, M: Into<String>>(api_key: S, model: M) -> Self {
        Self {
            host: ANTHROPIC_DEFAULT_HOST.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
        }
    }
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> AssistantResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "stream": true,
            "messages": messages_to_anthropic_spec(messages),
        });
        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools.iter().map(tool_to_anthropic_spec).collect());
        }
        payload
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> AssistantResult<ModelStream> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));
        let payload = self.build_payload(system, messages, tools);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AssistantError::ModelStream(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(into_stream(response)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AssistantError::ModelStream(format!(
                    "request failed: {status} - {body}"
                )))
            }
        }
    }
}

/// Convert transcript messages into Anthropic message objects.
///
/// Tool-role messages become `tool_result` blocks inside a user message,
/// which is how the Messages API expects execution results back.
fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::new();
    for message in messages {
        let role = match message.role {
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
        };

        let mut blocks = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    blocks.push(json!({"type": "text", "text": text}));
                }
                MessageContent::ToolRequest(request) => {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": request.id,
                        "name": request.call.name,
                        "input": request.call.arguments,
                    }));
                }
                MessageContent::ToolResult(output) => {
                    let (text, is_error) = match &output.result {
                        Ok(text) => (text.clone(), false),
                        Err(e) => (e.to_string(), true),
                    };
                    blocks.push(json!({
                        "type": "tool_result",
                        "tool_use_id": output.id,
                        "content": text,
                        "is_error": is_error,
                    }));
                }
            }
        }

        spec.push(json!({"role": role, "content": blocks}));
    }
    spec
}

fn tool_to_anthropic_spec(tool: &Tool) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

/// State tracked per in-flight tool-use block during streaming.
struct ToolUseState {
    id: String,
    name: String,
    json_buffer: String,
}

/// Cap on the undecoded event buffer; trips on malformed or runaway
/// streams.
const MAX_STREAM_BUFFER: usize = 16 * 1024 * 1024;

/// Convert an SSE response body into a `ModelStream`.
///
/// Chunks are processed as they arrive; complete SSE events are delimited
/// by a blank line. Network chunks can split anywhere, including inside a
/// multi-byte character, so undecoded bytes are carried over between
/// chunks and only the valid UTF-8 prefix is consumed.
fn into_stream(response: reqwest::Response) -> ModelStream {
    Box::pin(try_stream! {
        let mut body = response.bytes_stream();
        let mut raw: Vec<u8> = Vec::new();
        let mut buffer = String::new();
        let mut open_tools: HashMap<u32, ToolUseState> = HashMap::new();
        let mut stopped = false;

        while let Some(chunk) = body.next().await {
            let bytes =
                chunk.map_err(|e| AssistantError::ModelStream(format!("stream read error: {e}")))?;
            raw.extend_from_slice(&bytes);
            if raw.len() + buffer.len() > MAX_STREAM_BUFFER {
                Err(AssistantError::ModelStream(
                    "stream buffer exceeded 16 MiB".into(),
                ))?;
            }
            drain_valid_utf8(&mut raw, &mut buffer);

            while let Some(pos) = buffer.find("\n\n") {
                let event_text: String = buffer.drain(..pos + 2).collect();
                for event in parse_sse_event(&event_text, &mut open_tools) {
                    if matches!(event, ModelEvent::Stop { .. }) {
                        stopped = true;
                    }
                    yield event;
                }
            }
        }

        if !stopped {
            Err(AssistantError::ModelStream(
                "model stream ended without a stop marker".into(),
            ))?;
        }
    })
}

/// Move the valid UTF-8 prefix of `bytes` into `out`.
///
/// A trailing incomplete sequence stays in `bytes` until the next chunk
/// completes it; permanently invalid bytes are skipped.
fn drain_valid_utf8(bytes: &mut Vec<u8>, out: &mut String) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                out.push_str(text);
                bytes.clear();
                return;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&bytes[..valid_up_to]) {
                    out.push_str(valid);
                }
                match e.error_len() {
                    Some(invalid) => {
                        bytes.drain(..valid_up_to + invalid);
                    }
                    None => {
                        bytes.drain(..valid_up_to);
                        return;
                    }
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct SseFrame {
    #[serde(rename = "type")]
    kind: String,
    index: Option<u32>,
    content_block: Option<SseBlock>,
    delta: Option<SseDelta>,
}

#[derive(Deserialize)]
struct SseBlock {
    #[serde(rename = "type")]
    kind: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct SseDelta {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    partial_json: Option<String>,
    stop_reason: Option<String>,
}

/// Parse one SSE event into zero or more `ModelEvent`s.
///
/// Pings, usage reports, and `message_stop` produce nothing.
fn parse_sse_event(event_text: &str, open_tools: &mut HashMap<u32, ToolUseState>) -> Vec<ModelEvent> {
    let Some(data) = extract_data_line(event_text) else {
        return vec![];
    };
    let Ok(frame) = serde_json::from_str::<SseFrame>(data) else {
        return vec![];
    };

    match frame.kind.as_str() {
        "content_block_start" => {
            if let (Some(index), Some(block)) = (frame.index, frame.content_block) {
                if block.kind == "tool_use" {
                    open_tools.insert(
                        index,
                        ToolUseState {
                            id: block.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                            name: block.name.unwrap_or_default(),
                            json_buffer: String::new(),
                        },
                    );
                }
            }
            vec![]
        }
        "content_block_delta" => {
            let (Some(index), Some(delta)) = (frame.index, frame.delta) else {
                return vec![];
            };
            match delta.kind.as_deref() {
                Some("text_delta") => delta
                    .text
                    .map(ModelEvent::TextDelta)
                    .into_iter()
                    .collect(),
                Some("input_json_delta") => {
                    if let (Some(state), Some(partial)) =
                        (open_tools.get_mut(&index), delta.partial_json)
                    {
                        state.json_buffer.push_str(&partial);
                    }
                    vec![]
                }
                _ => vec![],
            }
        }
        "content_block_stop" => {
            let Some(state) = frame.index.and_then(|index| open_tools.remove(&index)) else {
                return vec![];
            };
            let json_str = if state.json_buffer.is_empty() {
                "{}".to_string()
            } else {
                state.json_buffer
            };
            // Malformed arguments become null and are rejected by argument
            // validation, which reports back to the model.
            let arguments: Value = serde_json::from_str(&json_str).unwrap_or_default();
            vec![ModelEvent::ToolUse {
                id: state.id,
                call: ToolCall::new(state.name, arguments),
            }]
        }
        "message_delta" => {
            let Some(reason) = frame.delta.and_then(|d| d.stop_reason) else {
                return vec![];
            };
            vec![ModelEvent::Stop {
                tool_use: reason == "tool_use",
            }]
        }
        _ => vec![],
    }
}

/// Extract the `data: ` payload from an SSE event text block.
fn extract_data_line(event_text: &str) -> Option<&str> {
    for line in event_text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(data) = line.strip_prefix("data: ") {
            return Some(data);
        }
    }
    None
}
