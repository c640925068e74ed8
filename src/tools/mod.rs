//! Tool adapter layer.
//!
//! Every capability the reasoning engine may use is wrapped as a [`Tool`]:
//! a stable name, a human-readable description, and a single
//! string-in/string-out function.  The [`ToolRegistry`] holds the tool set
//! presented to the engine and dispatches calls by name.
//!
//! Tools never fail: every error is rendered into the returned string.

pub mod builtins;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;

// ── Tool metadata ────────────────────────────────────────────

/// Metadata describing a tool available to the agent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolMeta {
    /// Stable name the reasoning engine calls the tool by (e.g. `"WeatherLookup"`).
    pub name: String,
    /// Usage description, including accepted sub-commands and input format.
    pub description: String,
}

impl ToolMeta {
    /// Function definition in OpenAI `tools` format.  Every tool takes a
    /// single `input` string.
    pub fn function_def(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": {
                        "input": {
                            "type": "string",
                            "description": "The tool input, formatted as the description requires."
                        }
                    },
                    "required": ["input"],
                    "additionalProperties": false
                }
            }
        })
    }
}

// ── Tool trait ───────────────────────────────────────────────

/// Trait implemented by every tool the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name and description.
    fn meta(&self) -> ToolMeta;

    /// Run the tool.  Always produces a string, errors included.
    async fn invoke(&self, input: &str) -> String;
}

// ── Registry ─────────────────────────────────────────────────

/// The tool set presented to the reasoning engine.
///
/// Built once at startup and immutable afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the four standard tools from configuration.
    pub fn from_config(cfg: &Config) -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(builtins::search::SearchTool::from_config(&cfg.search)));
        reg.register(Arc::new(builtins::weather::WeatherTool::from_config(&cfg.weather)));
        reg.register(Arc::new(builtins::system::SystemTool::from_config(cfg)));
        reg.register(Arc::new(builtins::chart::ChartTool::new(
            cfg.visualizations_dir.clone(),
        )));
        debug!(tools = ?reg.names(), "tool registry built");
        reg
    }

    /// Register a tool.
    ///
    /// Duplicate names are ignored (first registration wins).  Returns
    /// whether the tool was added.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.meta().name;
        if self.entries.iter().any(|t| t.meta().name == name) {
            warn!(tool = %name, "duplicate tool name ignored");
            return false;
        }
        self.entries.push(tool);
        true
    }

    /// Metadata for every registered tool, in registration order.
    pub fn list_tools(&self) -> Vec<ToolMeta> {
        self.entries.iter().map(|t| t.meta()).collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|t| t.meta().name).collect()
    }

    /// Function definitions for every tool.
    pub fn function_defs(&self) -> Vec<Value> {
        self.list_tools().iter().map(ToolMeta::function_def).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, input: &str) -> String {
        match self.entries.iter().find(|t| t.meta().name == name) {
            Some(tool) => {
                debug!(tool = %name, input_len = input.len(), "invoking tool");
                tool.invoke(input).await
            }
            None => format!(
                "unknown tool: {name}. Available tools: {}",
                self.names().join(", ")
            ),
        }
    }
}

/// Replace spaces (and path separators) with underscores so a title can be
/// used as a filename inside a fixed directory.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}
