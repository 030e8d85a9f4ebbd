//! Long-term fact and preference store
//!
//! Flat key-value maps persisted as one pretty-printed JSON file. Every
//! mutation rewrites the whole file; there is no locking across processes, so
//! a single writer is assumed.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Maximum interaction-history entries kept on disk
const HISTORY_LIMIT: usize = 100;

/// Store handle shared between the REPL, the HTTP facade, and memory tools
pub type SharedMemory = Arc<Mutex<MemoryStore>>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Could not save memory to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not encode memory: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub value: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct MemoryData {
    #[serde(default)]
    facts: BTreeMap<String, Fact>,
    #[serde(default)]
    preferences: BTreeMap<String, String>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    data: MemoryData,
}

impl MemoryStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// one is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load(&path);
        Self { path, data }
    }

    fn load(path: &Path) -> MemoryData {
        if !path.exists() {
            return MemoryData::default();
        }
        match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not load memory");
                MemoryData::default()
            }
        }
    }

    fn save(&self) -> MemoryResult<()> {
        let encoded = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, encoded).map_err(|source| MemoryError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn into_shared(self) -> SharedMemory {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a fact, replacing any previous value for `key`
    pub fn remember_fact(&mut self, key: &str, value: &str) -> MemoryResult<()> {
        self.data.facts.insert(
            key.to_string(),
            Fact {
                value: value.to_string(),
                timestamp: Local::now(),
            },
        );
        self.save()?;
        tracing::info!(key, value, "Remembered fact");
        Ok(())
    }

    pub fn recall_fact(&self, key: &str) -> Option<&str> {
        self.data.facts.get(key).map(|f| f.value.as_str())
    }

    pub fn set_preference(&mut self, key: &str, value: &str) -> MemoryResult<()> {
        self.data
            .preferences
            .insert(key.to_string(), value.to_string());
        self.save()?;
        tracing::info!(key, value, "Preference set");
        Ok(())
    }

    pub fn get_preference(&self, key: &str) -> Option<&str> {
        self.data.preferences.get(key).map(String::as_str)
    }

    /// Fact values keyed by name, without timestamps
    pub fn all_facts(&self) -> BTreeMap<String, String> {
        self.data
            .facts
            .iter()
            .map(|(k, f)| (k.clone(), f.value.clone()))
            .collect()
    }

    pub fn all_preferences(&self) -> &BTreeMap<String, String> {
        &self.data.preferences
    }

    /// Record an interaction, keeping only the most recent entries
    pub fn add_to_history(&mut self, entry: &str) -> MemoryResult<()> {
        self.data.history.push(HistoryEntry {
            entry: entry.to_string(),
            timestamp: Local::now(),
        });
        if self.data.history.len() > HISTORY_LIMIT {
            let excess = self.data.history.len() - HISTORY_LIMIT;
            self.data.history.drain(..excess);
        }
        self.save()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.data.history
    }

    pub fn clear_all(&mut self) -> MemoryResult<()> {
        self.data = MemoryData::default();
        self.save()?;
        tracing::info!("All memory cleared");
        Ok(())
    }
}
