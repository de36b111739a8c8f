use crate::models::Message;
use crate::registry::ToolSet;

/// The transcript for one query: system prompt, the active tool set, and an
/// append-only sequence of messages.
///
/// Owned exclusively by one run of the assistant loop and discarded when the
/// query ends; there is no cross-query persistence.
#[derive(Debug, Clone)]
pub struct Conversation {
    system: String,
    tools: ToolSet,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new<S: Into<String>>(system: S, tools: ToolSet) -> Self {
        Self {
            system: system.into(),
            tools,
            messages: Vec::new(),
        }
    }

    /// Append a user turn; convenience for starting a query.
    pub fn with_user<S: Into<String>>(mut self, text: S) -> Self {
        self.append(Message::user().with_text(text));
        self
    }

    /// Append a message. Messages are never reordered or removed.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
