//! AG-UI request types

use crate::state::ConversationState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Role for AG-UI input/output messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    System,
    #[default]
    Assistant,
    User,
    Tool,
}

/// Function half of an assistant tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

/// Tool call recorded on an assistant message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    #[allow(dead_code)] // Always "function"
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// AG-UI message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    /// Assistant messages that only carry tool calls may omit content
    #[serde(default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(rename = "toolCallId", skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            id: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            id: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            id: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Frontend readable context entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    pub description: String,
    pub value: Value,
}

/// Tool a client advertises. Accepted but not executed; only backend tools run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,
    #[allow(dead_code)] // Client tools are only logged by name
    #[serde(default)]
    pub description: String,
    #[allow(dead_code)] // Client tools are only logged by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Request to run the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAgentInput {
    #[serde(rename = "threadId")]
    pub thread_id: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub context: Vec<Context>,
    /// Client-held state; loaded into the session before the turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(rename = "parentRunId", skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    #[serde(
        rename = "forwardedProps",
        alias = "forwarded_props",
        skip_serializing_if = "Option::is_none"
    )]
    pub forwarded_props: Option<Value>,
}

#[cfg(test)]
impl RunAgentInput {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            context: Vec::new(),
            state: None,
            parent_run_id: None,
            forwarded_props: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }
}

impl RunAgentInput {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.thread_id.is_empty() {
            return Err(RequestError::InvalidField("threadId cannot be empty".into()));
        }
        if self.run_id.is_empty() {
            return Err(RequestError::InvalidField("runId cannot be empty".into()));
        }
        Ok(())
    }

    /// The client-supplied state, if any.
    ///
    /// `null` and an absent field both mean "keep the session's state".
    pub fn conversation_state(&self) -> Result<Option<ConversationState>, RequestError> {
        match &self.state {
            None | Some(Value::Null) => Ok(None),
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| RequestError::InvalidState(e.to_string())),
            Some(other) => Err(RequestError::InvalidState(format!(
                "expected an object, got {other}"
            ))),
        }
    }
}

/// Rejected request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid field: {0}")]
    InvalidField(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_request() {
        let input: RunAgentInput = serde_json::from_value(json!({
            "threadId": "t1",
            "runId": "r1",
            "messages": [{"id": "m1", "role": "user", "content": "hi"}]
        }))
        .unwrap();

        assert_eq!(input.thread_id, "t1");
        assert_eq!(input.messages[0].text(), "hi");
        assert!(input.validate().is_ok());
        assert_eq!(input.conversation_state().unwrap(), None);
    }

    #[test]
    fn test_parse_assistant_tool_calls() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "toolCalls": [{"id": "c1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}}]
        }))
        .unwrap();

        assert_eq!(msg.text(), "");
        assert_eq!(msg.tool_calls[0].function.name, "get_weather");
    }

    #[test]
    fn test_validate_rejects_empty_ids() {
        let err = RunAgentInput::new("", "r1").validate().unwrap_err();
        assert!(matches!(err, RequestError::InvalidField(_)));
        assert!(RunAgentInput::new("t1", "").validate().is_err());
    }

    #[test]
    fn test_conversation_state_shapes() {
        let input = RunAgentInput::new("t", "r").with_state(json!({"proverbs": ["a", "b"]}));
        assert_eq!(
            input.conversation_state().unwrap().unwrap().proverbs,
            vec!["a", "b"]
        );

        let empty = RunAgentInput::new("t", "r").with_state(json!({}));
        assert!(empty.conversation_state().unwrap().unwrap().proverbs.is_empty());

        let null = RunAgentInput::new("t", "r").with_state(Value::Null);
        assert_eq!(null.conversation_state().unwrap(), None);

        let wrong = RunAgentInput::new("t", "r").with_state(json!({"proverbs": "nope"}));
        assert!(matches!(
            wrong.conversation_state(),
            Err(RequestError::InvalidState(_))
        ));

        let scalar = RunAgentInput::new("t", "r").with_state(json!(3));
        assert!(scalar.conversation_state().is_err());
    }
}
