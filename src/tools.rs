//! Tool registry and built-in tools
//!
//! A tool is a declared [`ToolSpec`] plus any [`ToolHandler`]. The registry
//! maps names to handlers and converts every failure, including a panicking
//! handler, into a [`ToolError`] at the dispatch boundary.

mod calculator;
mod memory;
mod time;
mod web_search;

pub use calculator::CalculatorTool;
pub use memory::{RecallFactTool, RememberFactTool};
pub use time::TimeTool;
pub use web_search::WebSearchTool;

use crate::llm::ToolDefinition;
use crate::memory::SharedMemory;
use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Decoded tool-call arguments
pub type ToolArgs = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    NotFound(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Execution(String),
    #[error("Tool '{tool}' crashed: {message}")]
    Panicked { tool: String, message: String },
}

/// Capability implemented by every tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool. The returned text goes back to the model verbatim.
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError>;
}

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Integer,
}

impl ParameterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
}

/// Declarative tool metadata, passed to the backend as-is
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn required(
        self,
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        self.parameter(name, kind, description, true)
    }

    #[must_use]
    pub fn optional(
        self,
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        self.parameter(name, kind, description, false)
    }

    fn parameter(
        mut self,
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(ToolParameter {
            name: name.into(),
            kind,
            description: description.into(),
            required,
        });
        self
    }

    /// JSON schema for the parameter object
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }
}

/// Deserialize tool arguments into a typed input struct
pub fn parse_args<T: DeserializeOwned>(args: &ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Name-to-handler mapping, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools: time, calculator, web search, and
    /// fact memory backed by `memory`.
    pub fn standard(memory: SharedMemory, search_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(TimeTool::spec(), Arc::new(TimeTool));
        registry.register(CalculatorTool::spec(), Arc::new(CalculatorTool));
        registry.register(
            WebSearchTool::spec(),
            Arc::new(WebSearchTool::new(search_timeout)),
        );
        registry.register(
            RememberFactTool::spec(),
            Arc::new(RememberFactTool::new(memory.clone())),
        );
        registry.register(RecallFactTool::spec(), Arc::new(RecallFactTool::new(memory)));
        registry
    }

    /// Add or replace the handler for `spec.name`.
    ///
    /// A replaced tool keeps its original position in [`Self::specs`].
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.spec.name == spec.name) {
            tracing::debug!(tool = %spec.name, "Replacing registered tool");
            existing.spec = spec;
            existing.handler = handler;
        } else {
            self.tools.push(RegisteredTool { spec, handler });
        }
    }

    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|t| &t.spec).collect()
    }

    /// Get all tool definitions for the backend
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.spec.to_definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name
    pub async fn dispatch(&self, name: &str, args: &ToolArgs) -> Result<String, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.spec.name == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        match AssertUnwindSafe(tool.handler.execute(args))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ToolError::Panicked {
                tool: name.to_string(),
                message: panic_message(panic.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
