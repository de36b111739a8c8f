use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::AssistantResult;
use crate::models::{Message, Tool, ToolCall};

/// An incremental fragment of one model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A fragment of the model's text output.
    TextDelta(String),
    /// A fully assembled tool call, ready to execute.
    ToolUse { id: String, call: ToolCall },
    /// The turn is over. `tool_use` is true when the model stopped to wait
    /// for tool results.
    Stop { tool_use: bool },
}

/// One streamed model turn. Ends after a `Stop` event; a stream that ends
/// without one is malformed.
pub type ModelStream = Pin<Box<dyn Stream<Item = AssistantResult<ModelEvent>> + Send>>;

/// Base trait for streamed chat-completion providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send the conversation and receive the model's next turn as a stream.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> AssistantResult<ModelStream>;
}
