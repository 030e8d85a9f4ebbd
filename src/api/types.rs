//! API request and response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Conversation to continue; omitted means the shared default session
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Client-side action the UI should take after showing a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAction {
    OpenCamera,
    RequestLocation,
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: &'static str,
    pub action: Option<ClientAction>,
}

/// Request to forget a session's conversation
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Stored facts and preferences
#[derive(Debug, Serialize)]
pub struct MemoryResponse {
    pub facts: BTreeMap<String, String>,
    pub preferences: BTreeMap<String, String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
