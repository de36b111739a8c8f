use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::base::{ModelEvent, ModelStream, Provider};
use crate::errors::AssistantResult;
use crate::models::{Message, Tool};

/// A provider that replays pre-scripted model turns, for testing.
///
/// Each call to [`stream`](Provider::stream) pops the next turn. Once the
/// script is exhausted, an empty turn (immediate stop) is returned. The
/// provider records every call and the messages it was sent, so tests can
/// assert on transcript contents round by round.
#[derive(Clone)]
pub struct MockProvider {
    turns: Arc<Mutex<Vec<Vec<ModelEvent>>>>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of scripted turns
    pub fn new(turns: Vec<Vec<ModelEvent>>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns)),
            seen: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times the model has been called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The message history sent on each call, in call order
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> AssistantResult<ModelStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());

        let mut turns = self.turns.lock().unwrap();
        let turn = if turns.is_empty() {
            vec![ModelEvent::Stop { tool_use: false }]
        } else {
            turns.remove(0)
        };

        Ok(Box::pin(futures::stream::iter(turn.into_iter().map(Ok))))
    }
}
