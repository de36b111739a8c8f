//! The events the assistant loop emits toward the caller.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::AssistantError;

/// An atomic unit of progress emitted toward the caller.
///
/// The sequence for one query is ordered, finite, and non-restartable: zero
/// or more `Text`/tool markers followed by exactly one `Completed`, or
/// terminated early by an `Err` item in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AssistantEvent {
    /// A fragment of the model's answer, forwarded as soon as it arrives.
    Text(String),
    /// A tool invocation is about to run.
    ToolStarted { id: String, name: String },
    /// A tool invocation finished; `error` marks a model-visible failure.
    ToolCompleted { id: String, name: String, error: bool },
    /// The model produced a final answer with no further tool calls.
    Completed,
}

/// A pinned, boxed, `Send` stream of assistant events.
///
/// An `Err` item is terminal: the loop yields nothing after it.
pub type AssistantStream =
    Pin<Box<dyn Stream<Item = Result<AssistantEvent, AssistantError>> + Send>>;
