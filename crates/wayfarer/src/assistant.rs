//! The model/tool round-trip loop.
//!
//! One round sends the conversation to the provider, forwards text
//! fragments to the caller as they arrive, and collects any tool calls the
//! model issued. If the turn ended in tool use, the calls are executed
//! concurrently, their results are appended to the conversation in request
//! order, and the loop goes back to the model with the extended history.
//! The loop ends when a turn completes without tool calls, when the round
//! guard trips, or when the model stream fails.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;

use crate::conversation::Conversation;
use crate::errors::{AssistantError, AssistantResult};
use crate::events::{AssistantEvent, AssistantStream};
use crate::models::{Message, ToolRequest};
use crate::providers::base::{ModelEvent, ModelStream, Provider};

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Maximum model rounds for one query. Guards against a model that
    /// requests tools forever.
    pub max_rounds: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self { max_rounds: 10 }
    }
}

/// Drives conversations against a provider. Cheap to construct per query.
pub struct Assistant {
    provider: Arc<dyn Provider>,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_config(provider, AssistantConfig::default())
    }

    pub fn with_config(provider: Arc<dyn Provider>, config: AssistantConfig) -> Self {
        Self { provider, config }
    }

    /// Run the loop over `conversation`, producing the event stream for the
    /// caller.
    ///
    /// The conversation is owned by the loop and discarded when the stream
    /// ends. Dropping the stream cancels the current model turn and any
    /// tool executions still in flight.
    pub fn reply(&self, conversation: Conversation) -> AssistantStream {
        let state = LoopState {
            provider: Arc::clone(&self.provider),
            conversation,
            config: self.config.clone(),
            round: 0,
            text: String::new(),
            requests: Vec::new(),
            pending: VecDeque::new(),
            phase: Phase::AwaitingModel,
        };

        Box::pin(futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    if item.is_err() {
                        // Terminal: nothing is emitted after a failure.
                        state.pending.clear();
                        state.phase = Phase::Done;
                    }
                    return Some((item, state));
                }

                match std::mem::replace(&mut state.phase, Phase::Done) {
                    Phase::Done => return None,
                    Phase::AwaitingModel => state.phase = state.await_model().await,
                    Phase::ModelStreaming(stream) => state.phase = state.drive_model(stream).await,
                    Phase::ExecutingTools => state.phase = state.queue_started_markers(),
                    Phase::RunningTools => state.phase = state.run_tools().await,
                }
            }
        }))
    }
}

enum Phase {
    /// About to send the conversation to the model.
    AwaitingModel,
    /// Pulling events from the model's streamed turn.
    ModelStreaming(ModelStream),
    /// Tool calls collected; started markers not yet queued.
    ExecutingTools,
    /// Markers queued; executions about to run.
    RunningTools,
    /// Terminal. The unfold returns `None` on the next poll.
    Done,
}

struct LoopState {
    provider: Arc<dyn Provider>,
    conversation: Conversation,
    config: AssistantConfig,
    round: u32,
    /// Text accumulated from the current model turn.
    text: String,
    /// Tool calls issued by the current model turn, in issue order.
    requests: Vec<ToolRequest>,
    /// Events ready to be yielded before the machine advances.
    pending: VecDeque<AssistantResult<AssistantEvent>>,
    phase: Phase,
}

impl LoopState {
    async fn await_model(&mut self) -> Phase {
        self.round += 1;
        if self.round > self.config.max_rounds {
            self.pending
                .push_back(Err(AssistantError::LoopLimitExceeded(self.config.max_rounds)));
            return Phase::Done;
        }

        let definitions = self.conversation.tools().definitions();
        match self
            .provider
            .stream(
                self.conversation.system(),
                self.conversation.messages(),
                &definitions,
            )
            .await
        {
            Ok(stream) => {
                self.text.clear();
                self.requests.clear();
                Phase::ModelStreaming(stream)
            }
            Err(e) => {
                self.pending.push_back(Err(e));
                Phase::Done
            }
        }
    }

    async fn drive_model(&mut self, mut stream: ModelStream) -> Phase {
        match stream.next().await {
            Some(Ok(ModelEvent::TextDelta(text))) => {
                self.text.push_str(&text);
                self.pending.push_back(Ok(AssistantEvent::Text(text)));
                Phase::ModelStreaming(stream)
            }
            Some(Ok(ModelEvent::ToolUse { id, call })) => {
                self.requests.push(ToolRequest { id, call });
                Phase::ModelStreaming(stream)
            }
            Some(Ok(ModelEvent::Stop { .. })) => {
                if self.requests.is_empty() {
                    if !self.text.is_empty() {
                        let text = std::mem::take(&mut self.text);
                        self.conversation.append(Message::assistant().with_text(text));
                    }
                    self.pending.push_back(Ok(AssistantEvent::Completed));
                    Phase::Done
                } else {
                    // Trailing events after the stop marker carry nothing
                    // the loop needs; the turn's stream is dropped here.
                    Phase::ExecutingTools
                }
            }
            Some(Err(e)) => {
                self.pending.push_back(Err(e));
                Phase::Done
            }
            None => {
                self.pending.push_back(Err(AssistantError::ModelStream(
                    "model stream ended before the stop marker".into(),
                )));
                Phase::Done
            }
        }
    }

    fn queue_started_markers(&mut self) -> Phase {
        for request in &self.requests {
            self.pending.push_back(Ok(AssistantEvent::ToolStarted {
                id: request.id.clone(),
                name: request.call.name.clone(),
            }));
        }
        Phase::RunningTools
    }

    async fn run_tools(&mut self) -> Phase {
        let requests = std::mem::take(&mut self.requests);
        let tools = self.conversation.tools().clone();

        // Execute concurrently; join_all keeps outputs in request order no
        // matter which execution finishes first.
        let futures: Vec<_> = requests
            .iter()
            .map(|request| tools.dispatch(&request.call))
            .collect();
        let outputs = futures::future::join_all(futures).await;

        let mut assistant = Message::assistant();
        if !self.text.is_empty() {
            assistant = assistant.with_text(std::mem::take(&mut self.text));
        }
        for request in &requests {
            assistant = assistant.with_tool_request(request.id.clone(), request.call.clone());
        }
        self.conversation.append(assistant);

        for (request, output) in requests.into_iter().zip(outputs) {
            if let Err(ref error) = output {
                tracing::warn!(tool = %request.call.name, %error, "tool call failed");
            }
            self.pending.push_back(Ok(AssistantEvent::ToolCompleted {
                id: request.id.clone(),
                name: request.call.name.clone(),
                error: output.is_err(),
            }));
            self.conversation
                .append(Message::tool().with_tool_result(request.id, request.call.name, output));
        }

        Phase::AwaitingModel
    }
}
