//! Tools the model can call, and the registry that offers and executes them
//!
//! Tools are stateless singletons. Everything a call needs (the session's
//! state store, its id, the turn's cancellation token) arrives through
//! [`ToolContext`].

mod proverbs;
mod weather;

pub use proverbs::{AddProverbsTool, DisplayProverbsTool, SetProverbsTool};
pub use weather::GetWeatherTool;

use crate::config::AgentProfile;
use crate::llm::ToolDefinition;
use crate::state::{StateChangeEvent, StateStore};
use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// The tool touched (or projected) state
    StateChanged(StateChangeEvent),
    Text(String),
}

impl ToolOutput {
    /// What the model sees as the tool result
    pub fn content(&self) -> String {
        match self {
            Self::StateChanged(event) => event.to_value().to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    pub fn state_event(&self) -> Option<&StateChangeEvent> {
        match self {
            Self::StateChanged(event) => Some(event),
            Self::Text(_) => None,
        }
    }
}

/// Failures reported back to the model as tool-error results
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("Tool {tool} failed: {reason}")]
    HandlerFault { tool: String, reason: String },
}

/// Registration failures. These are programming errors surfaced at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("Tool '{tool}' declares an invalid schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// Per-invocation context, created fresh for each tool call
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub state: StateStore,
    /// Cancellation signal of the enclosing turn
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>, state: StateStore, cancel: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            state,
            cancel,
        }
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Deserialize tool input into its typed form
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Collection of tools available to a turn.
///
/// The definitions offered to the model and the handlers that execute are
/// the same entries, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tool set for an agent profile
    pub fn for_profile(profile: AgentProfile) -> Result<Self, RegistryError> {
        let tools: Vec<Arc<dyn Tool>> = match profile {
            AgentProfile::Basic => vec![Arc::new(AddProverbsTool), Arc::new(GetWeatherTool)],
            AgentProfile::Curated => vec![
                Arc::new(AddProverbsTool),
                Arc::new(SetProverbsTool),
                Arc::new(DisplayProverbsTool),
                Arc::new(GetWeatherTool),
            ],
        };

        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.get(&name).is_some() {
            return Err(RegistryError::DuplicateTool(name));
        }
        validate_schema(&name, &tool.input_schema())?;
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name. A panicking handler is reported as a fault.
    pub async fn invoke(
        &self,
        name: &str,
        input: Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        if ctx.cancel.is_cancelled() {
            return Err(ToolError::HandlerFault {
                tool: name.to_string(),
                reason: "turn cancelled before the tool ran".to_string(),
            });
        }

        let session_id = ctx.session_id.clone();
        let result = AssertUnwindSafe(tool.run(input, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                Err(ToolError::HandlerFault {
                    tool: name.to_string(),
                    reason: format!("handler panicked: {reason}"),
                })
            });

        match &result {
            Ok(_) => tracing::debug!(session_id = %session_id, tool = name, "Tool succeeded"),
            Err(e) => tracing::warn!(session_id = %session_id, tool = name, error = %e, "Tool failed"),
        }
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Structural check of a declared parameter schema
fn validate_schema(tool: &str, schema: &Value) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidSchema {
        tool: tool.to_string(),
        reason: reason.to_string(),
    };

    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Err(invalid("top-level type must be \"object\""));
    }
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("\"properties\" must be an object"))?;

    if let Some(required) = schema.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| invalid("\"required\" must be an array"))?;
        for key in required {
            let key = key
                .as_str()
                .ok_or_else(|| invalid("\"required\" entries must be strings"))?;
            if !properties.contains_key(key) {
                return Err(invalid(&format!("required key '{key}' is not declared")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversationState;
    use serde_json::json;

    pub(crate) fn test_context(state: StateStore) -> ToolContext {
        ToolContext::new("test-session", state, CancellationToken::new())
    }

    struct FixedSchemaTool {
        name: &'static str,
        schema: Value,
    }

    #[async_trait]
    impl Tool for FixedSchemaTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> String {
            "test".into()
        }
        fn input_schema(&self) -> Value {
            self.schema.clone()
        }
        async fn run(&self, _input: Value, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
            panic!("boom");
        }
    }

    #[test]
    fn test_profiles() {
        let basic = ToolRegistry::for_profile(AgentProfile::Basic).unwrap();
        assert_eq!(basic.names(), vec!["add_proverbs", "get_weather"]);

        let curated = ToolRegistry::for_profile(AgentProfile::Curated).unwrap();
        assert_eq!(
            curated.names(),
            vec!["add_proverbs", "set_proverbs", "display_proverbs", "get_weather"]
        );
        let defs = curated.definitions();
        assert_eq!(defs.len(), 4);
        assert_eq!(defs[3].input_schema["required"], json!(["location"]));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetWeatherTool)).unwrap();
        let err = registry.register(Arc::new(GetWeatherTool)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("get_weather".into()));
    }

    #[test]
    fn test_invalid_schemas_rejected() {
        let cases = [
            json!({"type": "string"}),
            json!({"type": "object"}),
            json!({"type": "object", "properties": {}, "required": ["x"]}),
            json!({"type": "object", "properties": {}, "required": "x"}),
        ];
        for schema in cases {
            let mut registry = ToolRegistry::new();
            let err = registry
                .register(Arc::new(FixedSchemaTool {
                    name: "bad",
                    schema: schema.clone(),
                }))
                .unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidSchema { .. }),
                "accepted {schema}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_leaves_state_alone() {
        let registry = ToolRegistry::for_profile(AgentProfile::Curated).unwrap();
        let store = StateStore::new(ConversationState::new(vec!["keep".into()]));

        let err = registry
            .invoke("no_such_tool", json!({}), test_context(store.clone()))
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::UnknownTool("no_such_tool".into()));
        assert_eq!(store.get().proverbs, vec!["keep"]);
    }

    #[tokio::test]
    async fn test_invalid_arguments_reported() {
        let registry = ToolRegistry::for_profile(AgentProfile::Curated).unwrap();
        let store = StateStore::default();

        let err = registry
            .invoke("add_proverbs", json!({"proverbs": "not a list"}), test_context(store.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "add_proverbs"));
        assert!(store.get().proverbs.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_fault() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FixedSchemaTool {
                name: "explodes",
                schema: json!({"type": "object", "properties": {}}),
            }))
            .unwrap();

        let err = registry
            .invoke("explodes", json!({}), test_context(StateStore::default()))
            .await
            .unwrap_err();

        match err {
            ToolError::HandlerFault { tool, reason } => {
                assert_eq!(tool, "explodes");
                assert!(reason.contains("boom"));
            }
            other => panic!("expected HandlerFault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_handler() {
        let registry = ToolRegistry::for_profile(AgentProfile::Curated).unwrap();
        let store = StateStore::new(ConversationState::new(vec!["keep".into()]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = registry
            .invoke(
                "set_proverbs",
                json!({"proverbs": ["replaced"]}),
                ToolContext::new("test-session", store.clone(), cancel),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::HandlerFault { ref tool, .. } if tool == "set_proverbs"));
        assert_eq!(store.get().proverbs, vec!["keep"]);
    }

    #[test]
    fn test_output_content() {
        let event = StateChangeEvent::snapshot(ConversationState::new(vec!["a".into()]));
        let output = ToolOutput::StateChanged(event.clone());
        assert_eq!(output.content(), r#"{"proverbs":["a"]}"#);
        assert_eq!(output.state_event(), Some(&event));
        assert_eq!(ToolOutput::Text("hi".into()).content(), "hi");
    }
}
