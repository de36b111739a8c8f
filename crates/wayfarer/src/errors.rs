use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that are recoverable at the loop level. They are folded into a
/// tool-result message so the model can see them and adapt; they never
/// terminate the response stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Failures that end the query. Surfaced as the terminal item of the
/// assistant stream, never as a silent hang or a truncated stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AssistantError {
    #[error("Invalid tool set: {0}")]
    Configuration(String),

    #[error("Model stream error: {0}")]
    ModelStream(String),

    #[error("Round limit of {0} exceeded")]
    LoopLimitExceeded(u32),
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;
pub type AssistantResult<T> = std::result::Result<T, AssistantError>;
