//! Conversation turn types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the backend.
///
/// `id` is unique within one assistant turn and correlates the call with the
/// tool-result turn produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    #[cfg(test)]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One message unit in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    /// Absent on assistant turns that only carry tool calls
    pub content: Option<String>,
    /// Only on assistant turns that request tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    /// Only on tool-result turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Only on tool-result turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ConversationTurn {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.filter(|c| !c.is_empty()),
            tool_calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_with_calls_drops_empty_content() {
        let turn = ConversationTurn::assistant_with_calls(
            Some(String::new()),
            vec![ToolInvocation::new("c1", "time", Map::new())],
        );
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.content.is_none());
        assert_eq!(turn.tool_calls.len(), 1);
    }

    #[test]
    fn test_tool_result_carries_correlation() {
        let turn = ConversationTurn::tool_result("c1", "time", "10:30 AM");
        assert!(turn.is_tool_result());
        assert_eq!(turn.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(turn.tool_name.as_deref(), Some("time"));
        assert_eq!(turn.text(), "10:30 AM");
    }

    #[test]
    fn test_plain_turn_serialization_skips_tool_fields() {
        let json = serde_json::to_value(ConversationTurn::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }
}
