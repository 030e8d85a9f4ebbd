//! Tools giving the model access to the long-term fact store

use super::{parse_args, ParameterKind, ToolArgs, ToolError, ToolHandler, ToolSpec};
use crate::memory::{MemoryStore, SharedMemory};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::MutexGuard;

fn lock(memory: &SharedMemory) -> Result<MutexGuard<'_, MemoryStore>, ToolError> {
    memory
        .lock()
        .map_err(|_| ToolError::Execution("Memory store is unavailable".to_string()))
}

pub struct RememberFactTool {
    memory: SharedMemory,
}

#[derive(Debug, Deserialize)]
struct RememberInput {
    key: String,
    value: String,
}

impl RememberFactTool {
    pub fn new(memory: SharedMemory) -> Self {
        Self { memory }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "remember_fact",
            "Store a fact about the user for later conversations, e.g. their name or birthday",
        )
        .required("key", ParameterKind::String, "Short name for the fact, e.g. 'birthday'")
        .required("value", ParameterKind::String, "The fact itself")
    }
}

#[async_trait]
impl ToolHandler for RememberFactTool {
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let input: RememberInput = parse_args(args)?;
        let key = input.key.trim();
        if key.is_empty() {
            return Err(ToolError::InvalidArguments("key must not be empty".to_string()));
        }
        lock(&self.memory)?
            .remember_fact(key, input.value.trim())
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(format!("Remembered {key} = {}", input.value.trim()))
    }
}

pub struct RecallFactTool {
    memory: SharedMemory,
}

#[derive(Debug, Deserialize)]
struct RecallInput {
    #[serde(default)]
    key: Option<String>,
}

impl RecallFactTool {
    pub fn new(memory: SharedMemory) -> Self {
        Self { memory }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "recall_fact",
            "Look up a stored fact about the user; omit the key to list every stored fact",
        )
        .optional("key", ParameterKind::String, "Name of the fact to look up")
    }
}

#[async_trait]
impl ToolHandler for RecallFactTool {
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let input: RecallInput = parse_args(args)?;
        let memory = lock(&self.memory)?;

        match input.key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Ok(memory.recall_fact(key).map_or_else(
                || format!("No fact stored for '{key}'."),
                |value| format!("{key} = {value}"),
            )),
            None => {
                let facts = memory.all_facts();
                if facts.is_empty() {
                    return Ok("No facts stored yet.".to_string());
                }
                Ok(facts
                    .iter()
                    .map(|(k, v)| format!("{k} = {v}"))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }
}
