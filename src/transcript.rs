//! Chat transcript shown by the web UI
//!
//! A flat JSON array of `{sender, text}` entries, rewritten on every append.
//! This is display history only; the model's context lives in
//! [`crate::conversation::ConversationHistory`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const USER_SENDER: &str = "User";
pub const ASSISTANT_SENDER: &str = "Jarvis";

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("Could not write transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not encode transcript: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender: String,
    pub text: String,
}

#[derive(Debug)]
pub struct TranscriptLog {
    path: PathBuf,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    /// Open the transcript at `path`; missing or unreadable files start empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        Self { path, entries }
    }

    fn load(path: &Path) -> Vec<TranscriptEntry> {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable transcript");
            Vec::new()
        })
    }

    pub fn append(&mut self, sender: &str, text: &str) -> Result<(), TranscriptError> {
        self.entries.push(TranscriptEntry {
            sender: sender.to_string(),
            text: text.to_string(),
        });
        let encoded = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, encoded).map_err(|source| TranscriptError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }
}
