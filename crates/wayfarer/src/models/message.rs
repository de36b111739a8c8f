use chrono::Utc;

use super::role::Role;
use super::tool::ToolCall;
use crate::errors::ToolResult;

/// A tool call as it appeared in an assistant turn, correlated by id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub call: ToolCall,
}

/// The outcome of executing a tool, correlated back to its request.
///
/// Errors are carried as data here on purpose: a failed tool call is a
/// message in the transcript, not a failure of the stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolOutput {
    pub id: String,
    pub name: String,
    pub result: ToolResult<String>,
}

/// Content carried inside a message: plain text, a tool-call request, or a
/// tool result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MessageContent {
    Text(String),
    ToolRequest(ToolRequest),
    ToolResult(ToolOutput),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref request) = self {
            Some(request)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolOutput> {
        if let MessageContent::ToolResult(ref output) = self {
            Some(output)
        } else {
            None
        }
    }
}

/// One turn in a conversation transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message::new(Role::Assistant)
    }

    /// Create a new tool-result message with the current timestamp
    pub fn tool() -> Self {
        Message::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::Text(text.into()))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, call: ToolCall) -> Self {
        self.with_content(MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            call,
        }))
    }

    /// Add a tool result to the message
    pub fn with_tool_result<S: Into<String>, N: Into<String>>(
        self,
        id: S,
        name: N,
        result: ToolResult<String>,
    ) -> Self {
        self.with_content(MessageContent::ToolResult(ToolOutput {
            id: id.into(),
            name: name.into(),
            result,
        }))
    }

    /// All tool requests carried by this message, in order.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(MessageContent::as_tool_request)
            .collect()
    }

    /// The concatenated text content of this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use serde_json::json;

    #[test]
    fn test_builders_preserve_content_order() {
        let message = Message::assistant()
            .with_text("Let me check.")
            .with_tool_request("1", ToolCall::new("geocode", json!({"address": "Seattle"})));

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content.len(), 2);
        assert_eq!(message.text(), "Let me check.");
        assert_eq!(message.tool_requests()[0].id, "1");
    }

    #[test]
    fn test_tool_result_roundtrips_errors() {
        let message =
            Message::tool().with_tool_result("1", "geocode", Err(ToolError::UnknownTool("geocode".into())));

        let output = message.content[0].as_tool_result().unwrap();
        assert!(output.result.is_err());

        let serialized = serde_json::to_string(&message).unwrap();
        let deserialized: Message = serde_json::from_str(&serialized).unwrap();
        assert_eq!(message, deserialized);
    }
}
