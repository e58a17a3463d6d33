//! Session Management
//!
//! The conversation session owns the ordered message log that is replayed to
//! the backend each turn, the iteration ceiling, and a reference to the
//! adapter that formats tool results.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::message::{Conversation, Message, Role};
use crate::provider::LlmProvider;
use crate::tool::{ToolCall, ToolCallResult};

/// Text recorded for tool calls that were never executed
pub const NOT_EXECUTED: &str = "Tool call was not executed.";

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation session
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    conversation: Conversation,
    provider: Arc<dyn LlmProvider>,
    max_iterations: usize,
}

impl Session {
    /// Create a session whose log starts with the system prompt
    pub fn new(
        system_prompt: impl Into<String>,
        max_iterations: usize,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            conversation: Conversation::with_system_prompt(system_prompt),
            provider,
            max_iterations,
        }
    }

    /// Append a plain turn
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.push(Message::new(role, content));
    }

    /// Append a message as received (e.g. a backend reply)
    pub fn push(&mut self, message: Message) {
        self.conversation.push(message);
    }

    /// Append a tool outcome in the active adapter's wire shape
    pub fn add_tool_response(&mut self, result: &ToolCallResult) {
        let formatted = self.provider.format_tool_result(result);
        self.push(formatted);
    }

    /// Full message log
    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Adapter used for requests and tool-result formatting
    pub fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }

    /// Replace the active adapter
    ///
    /// Entries already in the log keep the shape they were written in.
    pub fn set_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        self.provider = provider;
    }

    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Calls of the latest assistant tool request that have no response yet
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        let messages = self.messages();
        let Some(request_idx) = messages
            .iter()
            .rposition(|m| m.role == Role::Assistant && m.has_tool_calls())
        else {
            return Vec::new();
        };

        let mut responses: Vec<&Message> = messages[request_idx + 1..]
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();

        messages[request_idx]
            .tool_calls
            .iter()
            .filter(|call| {
                responses
                    .iter()
                    .position(|response| response.answers(call))
                    .map(|idx| responses.remove(idx))
                    .is_none()
            })
            .cloned()
            .collect()
    }

    /// Answer every pending call with a placeholder so the log replays cleanly
    ///
    /// Returns how many placeholders were appended.
    pub fn settle_pending_calls(&mut self) -> usize {
        let pending = self.pending_tool_calls();
        for call in &pending {
            tracing::debug!(tool = %call.name, "Settling unanswered tool call");
            self.add_tool_response(&ToolCallResult::for_call(call, NOT_EXECUTED));
        }
        pending.len()
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("provider", &self.provider.name())
            .field("max_iterations", &self.max_iterations)
            .field("messages", &self.conversation.len())
            .finish_non_exhaustive()
    }
}
