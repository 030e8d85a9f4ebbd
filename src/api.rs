//! HTTP API for the browser front end

mod handlers;
mod types;

pub use handlers::create_router;

use crate::conversation::{ConversationEngine, ConversationHistory};
use crate::memory::SharedMemory;
use crate::transcript::TranscriptLog;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Session used when a request does not name one
pub const DEFAULT_SESSION: &str = "default";

/// Turns retained per HTTP session
const SESSION_RETENTION: usize = 200;

/// Per-session conversation histories.
///
/// Each history sits behind its own async mutex, so requests for one session
/// are handled one at a time while different sessions proceed independently.
#[derive(Default)]
pub struct SessionManager {
    sessions: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<ConversationHistory>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// History for `id`, created empty on first use
    pub async fn session(&self, id: &str) -> Arc<tokio::sync::Mutex<ConversationHistory>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session = %id, "Starting session");
                Arc::new(tokio::sync::Mutex::new(ConversationHistory::with_retention(
                    SESSION_RETENTION,
                )))
            })
            .clone()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub sessions: Arc<SessionManager>,
    pub memory: SharedMemory,
    pub transcript: Arc<Mutex<TranscriptLog>>,
}

impl AppState {
    pub fn new(engine: Arc<ConversationEngine>, memory: SharedMemory, transcript: TranscriptLog) -> Self {
        Self {
            engine,
            sessions: Arc::new(SessionManager::new()),
            memory,
            transcript: Arc::new(Mutex::new(transcript)),
        }
    }
}
