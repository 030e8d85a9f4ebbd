//! Common types for model backend interactions

use crate::conversation::{ConversationTurn, ToolInvocation};

/// A single chat-completion request
///
/// `messages` is already windowed by the caller; the system prompt travels
/// separately and is always sent first.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub messages: Vec<ConversationTurn>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Tool definition as advertised to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Backend response: either final text or one or more tool calls
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

impl LlmResponse {
    /// Final-answer response with no tool calls
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            finish_reason: Some("stop".to_string()),
            ..Self::default()
        }
    }

    /// Response requesting the given tool calls
    #[cfg(test)]
    pub fn tool_calls(calls: Vec<ToolInvocation>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some("tool_calls".to_string()),
            ..Self::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, empty when the backend sent none
    pub fn text_content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
