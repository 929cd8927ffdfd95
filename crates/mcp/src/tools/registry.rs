// MCP tool trait, catalog and schema helpers

use crate::protocol::{CallToolResult, JsonRpcError, ToolSchema};
use marketing_miner_core::UnsupportedValue;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Failures that abort a tool call at the protocol level.
///
/// Anything that goes wrong once the upstream request is under way is
/// reported as a text result instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError::invalid_params(self.to_string())
    }
}

impl From<UnsupportedValue> for ToolError {
    fn from(err: UnsupportedValue) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult, ToolError>;
}

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool, replacing any earlier one with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool schemas, ordered by name
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a call by tool name
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(arguments).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize tool arguments; a missing/null argument object means "all defaults".
pub fn parse_arguments<T>(arguments: serde_json::Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Default,
{
    match arguments {
        serde_json::Value::Null => Ok(T::default()),
        serde_json::Value::Object(_) => serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArgument(format!("Invalid arguments: {}", e))),
        other => Err(ToolError::InvalidArgument(format!(
            "Arguments must be an object, got: {}",
            other
        ))),
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_enum(description: &str, values: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": description,
        "enum": values
    })
}

pub fn json_schema_boolean(description: &str, default: bool) -> serde_json::Value {
    serde_json::json!({
        "type": "boolean",
        "description": description,
        "default": default
    })
}
