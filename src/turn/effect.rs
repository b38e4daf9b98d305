//! Effects produced by turn transitions

use super::phase::ToolCall;

/// Work the dispatcher performs after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Consult the model with the current history
    RequestDecision,

    /// Append the model's message to history
    RecordAssistant {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },

    /// Stream prose that accompanied tool calls
    EmitText(String),

    ExecuteTool(ToolCall),

    /// Append a tool result to history
    RecordToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },

    EmitFinalAnswer(String),

    Finish,
}
