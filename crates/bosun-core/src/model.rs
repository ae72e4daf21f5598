use crate::error::ModelError;
use crate::prompt::SYSTEM_PROMPT;
use crate::types::{ToolCall, ToolSpec};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        name: String,
        content: String,
    },
}

/// Accumulated exchange with the model. The system instructions are fixed at
/// compile time and cannot be replaced once a conversation exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn system(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::User {
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(Message::Assistant {
            content: content.into(),
            tool_calls,
        });
    }

    pub fn push_tool(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message::Tool {
            name: name.into(),
            content: content.into(),
        });
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// What the model answered in one exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Final { text: String },
    ToolCalls { text: String, calls: Vec<ToolCall> },
}

/// One request/response exchange with a language model.
///
/// Implementations make a single attempt bounded by their own timeout and
/// never retry; retry policy belongs to the caller.
#[async_trait]
pub trait ModelDriver: Send + Sync {
    /// Recorded as `model_used` on each analysis.
    fn model_used(&self) -> String;

    async fn converse(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ModelError>;
}
