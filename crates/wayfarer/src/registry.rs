//! The active tool set for a conversation: definitions plus the
//! capability to execute them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{AssistantError, AssistantResult, ToolError, ToolResult};
use crate::models::{Tool, ToolCall};

/// A tool the model can invoke: a definition paired with an execute
/// capability. Implementations must not keep mutable state across calls;
/// concurrent invocations may overlap.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// The definition advertised to the model.
    fn definition(&self) -> &Tool;

    /// Run the tool. May perform network I/O and take significant
    /// wall-clock time; failures are reported as [`ToolError`], which the
    /// loop turns into a model-visible result.
    async fn execute(&self, arguments: Value) -> ToolResult<String>;
}

/// The immutable set of tools available to one conversation.
///
/// Selection happens once, before the loop starts. Cloning is cheap: the
/// executors are shared behind `Arc`.
#[derive(Clone)]
pub struct ToolSet {
    executors: Vec<Arc<dyn ToolExecutor>>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolSet {
    /// A set with no tools; the model can only answer from the prompt.
    pub fn empty() -> Self {
        Self {
            executors: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Build the active set from a list of executors.
    ///
    /// Fails with [`AssistantError::Configuration`] if two executors share
    /// a name.
    pub fn new(executors: Vec<Arc<dyn ToolExecutor>>) -> AssistantResult<Self> {
        let mut by_name = HashMap::new();
        for (index, executor) in executors.iter().enumerate() {
            let name = executor.definition().name.clone();
            if by_name.insert(name.clone(), index).is_some() {
                return Err(AssistantError::Configuration(format!(
                    "duplicate tool name '{name}'"
                )));
            }
        }
        Ok(Self { executors, by_name })
    }

    /// The definitions of all tools in the set, in registration order.
    pub fn definitions(&self) -> Vec<Tool> {
        self.executors
            .iter()
            .map(|executor| executor.definition().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Execute a model-issued tool call.
    ///
    /// Unknown names, malformed arguments, and execution failures all come
    /// back as `Err(ToolError)` so the loop can report them to the model
    /// instead of failing the stream.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult<String> {
        let Some(&index) = self.by_name.get(&call.name) else {
            return Err(ToolError::UnknownTool(call.name.clone()));
        };
        let executor = &self.executors[index];
        validate_arguments(&executor.definition().parameters, &call.arguments)?;
        executor.execute(call.arguments.clone()).await
    }
}

/// Check the arguments object against the schema's required keys.
///
/// Executors still deserialize into typed argument structs; this catches
/// the common failure modes up front with a message the model can act on.
fn validate_arguments(schema: &Value, arguments: &Value) -> ToolResult<()> {
    if !arguments.is_object() {
        return Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".into(),
        ));
    }
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if arguments.get(key).is_none() {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required field '{key}'"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        definition: Tool,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self {
                definition: Tool::new(
                    name,
                    "Echoes back the input",
                    json!({
                        "type": "object",
                        "required": ["message"],
                        "properties": {"message": {"type": "string"}}
                    }),
                ),
            }
        }
    }

    #[async_trait]
    impl ToolExecutor for EchoTool {
        fn definition(&self) -> &Tool {
            &self.definition
        }

        async fn execute(&self, arguments: Value) -> ToolResult<String> {
            Ok(arguments["message"].as_str().unwrap_or("").to_string())
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ToolSet::new(vec![
            Arc::new(EchoTool::new("echo")),
            Arc::new(EchoTool::new("echo")),
        ]);
        assert!(matches!(result, Err(AssistantError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let tools = ToolSet::new(vec![Arc::new(EchoTool::new("echo"))]).unwrap();
        let result = tools
            .dispatch(&ToolCall::new("missing", json!({"message": "hi"})))
            .await;
        assert_eq!(result, Err(ToolError::UnknownTool("missing".into())));
    }

    #[tokio::test]
    async fn test_dispatch_missing_required_argument() {
        let tools = ToolSet::new(vec![Arc::new(EchoTool::new("echo"))]).unwrap();
        let result = tools.dispatch(&ToolCall::new("echo", json!({}))).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_dispatch_non_object_arguments() {
        let tools = ToolSet::new(vec![Arc::new(EchoTool::new("echo"))]).unwrap();
        let result = tools.dispatch(&ToolCall::new("echo", json!("hi"))).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let tools = ToolSet::new(vec![Arc::new(EchoTool::new("echo"))]).unwrap();
        let result = tools
            .dispatch(&ToolCall::new("echo", json!({"message": "hello"})))
            .await;
        assert_eq!(result, Ok("hello".to_string()));
    }
}
