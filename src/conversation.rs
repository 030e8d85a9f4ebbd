//! Conversation core: turns, session history, and the tool-calling loop

mod engine;
mod history;
mod turn;

pub use engine::{ConversationEngine, EngineConfig};
pub use history::ConversationHistory;
pub use turn::{ConversationTurn, Role, ToolInvocation};
