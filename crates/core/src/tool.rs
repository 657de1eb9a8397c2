//! Tool trait, registry, and executor.
//!
//! Tools are what let the assistant act in the world: fetch a URL, do math,
//! look up the time. The registry validates registrations at startup and the
//! executor guarantees that every `ToolCall` produces exactly one
//! `ToolResult` — success or error, never a raised failure. The agent loop
//! relies on that guarantee to report tool errors back to the model as
//! context for a retry on the next step.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, ToolError};

/// A tool definition: what the model is told about a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name, unique within a registry
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A request to execute a tool, produced by the output parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id tying the eventual result back to this call
    pub call_id: String,

    /// Name of the tool to execute
    pub tool: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            call_id: Uuid::new_v4().to_string(),
            tool: tool.into(),
            arguments,
        }
    }
}

/// What a tool hands back on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The result value shown to the model
    pub value: serde_json::Value,

    /// Base64-encoded blobs to surface on the final response (images, files)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl ToolOutput {
    /// A plain text output.
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            value: serde_json::Value::String(s.into()),
            attachments: Vec::new(),
        }
    }

    /// A structured JSON output.
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            value,
            attachments: Vec::new(),
        }
    }

    /// Attach an already base64-encoded blob.
    pub fn with_attachment(mut self, encoded: impl Into<String>) -> Self {
        self.attachments.push(encoded.into());
        self
    }

    /// Attach raw bytes; they are base64-encoded for transport.
    pub fn with_attachment_bytes(self, bytes: &[u8]) -> Self {
        use base64::Engine as _;
        self.with_attachment(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// The result of a tool execution. Exactly one per `ToolCall`;
/// `output` and `error` are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call this result answers
    pub call_id: String,

    /// Name of the tool that ran
    pub tool: String,

    /// The output value, present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// The error message, present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Base64-encoded blobs produced by the tool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: ToolOutput) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool: call.tool.clone(),
            output: Some(output.value),
            error: None,
            attachments: output.attachments,
        }
    }

    pub fn failure(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool: call.tool.clone(),
            output: None,
            error: Some(message.into()),
            attachments: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The core Tool trait.
///
/// Each tool (calculator, http_request, current_time, …) implements this
/// trait. Tools are registered in the ToolRegistry and described to the
/// model through the prompt's tool catalog.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (rendered into the prompt).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value)
    -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for the prompt catalog.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, doubling as the executor.
///
/// Backed by a `BTreeMap` so the catalog order is stable — prompt assembly
/// must be deterministic given identical inputs.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. A duplicate name is a configuration error — callers
    /// find out at startup, not when the model first tries the tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> crate::error::Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::Config {
                message: format!("tool '{name}' is already registered"),
            });
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, in stable name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Execute a tool call. Never fails: an unknown tool name, a tool error,
    /// or a panic inside a tool all come back as an error-result so the loop
    /// can fold them into the model's context.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.tool) else {
            return ToolResult::failure(call, format!("unknown tool '{}'", call.tool));
        };

        match AssertUnwindSafe(tool.execute(call.arguments.clone()))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => ToolResult::success(call, output),
            Ok(Err(e)) => {
                warn!(tool = %call.tool, error = %e, "Tool execution failed");
                ToolResult::failure(call, e.to_string())
            }
            Err(_) => {
                warn!(tool = %call.tool, "Tool panicked during execution");
                ToolResult::failure(call, format!("tool '{}' panicked", call.tool))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?;
            Ok(ToolOutput::text(text))
        }
    }

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn name(&self) -> &str {
            "panicky"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            panic!("tool bug");
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn duplicate_registration_is_a_config_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let err = registry.register(Box::new(EchoTool)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn definitions_in_stable_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PanickyTool)).unwrap();
        registry.register(Box::new(EchoTool)).unwrap();
        let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["echo".to_string(), "panicky".to_string()]);
    }

    #[tokio::test]
    async fn execute_tool_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        let call = ToolCall::new("echo", serde_json::json!({"text": "hello"}));
        let result = registry.execute(&call).await;
        assert!(!result.is_error());
        assert_eq!(result.output, Some(serde_json::json!("hello")));
        assert_eq!(result.call_id, call.call_id);
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_not_failure() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("nonexistent", serde_json::json!({}));
        let result = registry.execute(&call).await;
        assert!(result.is_error());
        assert!(result.error.as_deref().unwrap().contains("nonexistent"));
    }

    #[tokio::test]
    async fn tool_error_is_folded_into_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();

        let call = ToolCall::new("echo", serde_json::json!({}));
        let result = registry.execute(&call).await;
        assert!(result.is_error());
        assert!(result.error.as_deref().unwrap().contains("text"));
    }

    #[tokio::test]
    async fn tool_panic_is_caught_at_the_boundary() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PanickyTool)).unwrap();

        let call = ToolCall::new("panicky", serde_json::json!({}));
        let result = registry.execute(&call).await;
        assert!(result.is_error());
        assert!(result.error.as_deref().unwrap().contains("panicked"));
    }

    #[test]
    fn tool_output_attachments() {
        let out = ToolOutput::text("done").with_attachment("aGVsbG8=");
        assert_eq!(out.attachments.len(), 1);
    }

    #[test]
    fn attachment_bytes_are_base64_encoded() {
        let out = ToolOutput::text("done").with_attachment_bytes(b"hello");
        assert_eq!(out.attachments[0], "aGVsbG8=");
    }
}
