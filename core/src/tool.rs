//! Tool abstraction (C1): the contract between the step loop and callable tools.
//!
//! A single name -> tool registry: the step loop resolves a model-requested
//! call by name, invokes it, and never lets a failing call surface as an
//! `AgentError` — a failing tool produces a failed `ToolResult` instead.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Declares a tool's name, description and JSON-schema input shape, for exposure to the LLM.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Declared ahead of any call: the JSON schema of structured input a human
    /// must supply for this tool, if it ever needs one. Distinct from
    /// `ToolError::NeedsInput`, which is raised mid-call — this field lets a
    /// caller (or the LLM-facing tool listing) know the possibility exists
    /// before the tool is ever invoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_input_schema: Option<Value>,
}

/// Error a `Tool::call` may return. Always caught by the step loop and turned into a
/// failed `ToolResult` — it never aborts the run.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Failed(String),
    /// The tool cannot complete without structured input from a human — distinct
    /// from `requires_approval`, which gates the call before it ever runs. This
    /// variant is returned mid-call, carrying the JSON schema of what's needed.
    #[error("needs input")]
    NeedsInput(Value),
}

/// Result of executing one tool call, folded back into the conversation as a `tool` message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub success: bool,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the tool returned `ToolError::NeedsInput`: the JSON schema of the
    /// structured input a human must supply before this call can be retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_input: Option<Value>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            success: true,
            content: content.into(),
            error: None,
            needs_input: None,
        }
    }

    pub fn failed(call_id: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            call_id: call_id.into(),
            name: name.into(),
            success: false,
            content: format!("Error: {error}"),
            error: Some(error),
            needs_input: None,
        }
    }

    pub fn needs_input(call_id: impl Into<String>, name: impl Into<String>, schema: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            success: false,
            content: "waiting on structured user input".to_string(),
            error: None,
            needs_input: Some(schema),
        }
    }
}

/// A callable tool. `call` takes already-parsed JSON arguments and never panics;
/// any failure is returned as `Err(ToolError)`, which the caller turns into a
/// failed `ToolResult` rather than an `AgentError`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn call(&self, arguments: Value) -> Result<String, ToolError>;

    /// When set, a call to this tool requires human approval before `call` runs:
    /// the step loop transitions `AgentState` to `WAITING_INPUT` instead of invoking it.
    fn requires_approval(&self) -> bool {
        false
    }
}

/// Registry of tools available to a step loop, keyed by name.
///
/// Construction rejects duplicate names rather than silently shadowing — a
/// duplicate tool name is a configuration bug, not a runtime condition to
/// handle per call.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

#[derive(Debug, Error)]
#[error("duplicate tool name: {0}")]
pub struct DuplicateToolName(pub String);

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Executes a named tool call, parsing `arguments_json` as JSON.
    ///
    /// Never returns `Err` for tool-side failures: unknown tools, bad JSON, and
    /// `ToolError` are all folded into a failed `ToolResult` so a step's parallel
    /// tool fan-out can't be aborted by a single bad call.
    pub async fn execute(&self, call_id: &str, name: &str, arguments_json: &str) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::failed(call_id, name, format!("unknown tool: {name}"));
        };
        let args: Value = if arguments_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(arguments_json) {
                Ok(v) => v,
                Err(e) => {
                    return ToolResult::failed(call_id, name, format!("invalid arguments JSON: {e}"))
                }
            }
        };
        match tool.call(args).await {
            Ok(content) => ToolResult::ok(call_id, name, content),
            Err(ToolError::NeedsInput(schema)) => ToolResult::needs_input(call_id, name, schema),
            Err(e) => ToolResult::failed(call_id, name, e.to_string()),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn build(self) -> Result<ToolRegistry, DuplicateToolName> {
        let mut tools = HashMap::with_capacity(self.tools.len());
        for tool in self.tools {
            let name = tool.spec().name;
            if tools.insert(name.clone(), tool).is_some() {
                return Err(DuplicateToolName(name));
            }
        }
        Ok(ToolRegistry { tools })
    }
}
