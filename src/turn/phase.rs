//! Turn phase types

use crate::llm::{ContentBlock, LlmResponse};
use serde_json::Value;

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn to_content_block(&self) -> ContentBlock {
        ContentBlock::tool_use(&self.id, &self.name, self.input.clone())
    }
}

/// What the model wants to do next
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run these tools, in order. `text` is any prose that accompanied them.
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
    FinalAnswer(String),
}

impl Decision {
    pub fn from_response(response: &LlmResponse) -> Self {
        let calls: Vec<ToolCall> = response
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| ToolCall::new(id, name, input.clone()))
            .collect();
        let text = response.text();

        if calls.is_empty() {
            Decision::FinalAnswer(text)
        } else {
            Decision::ToolCalls {
                text: (!text.is_empty()).then_some(text),
                calls,
            }
        }
    }
}

/// Where a turn is. `round` counts model consultations, starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPhase {
    AwaitingModelDecision {
        round: usize,
    },
    ExecutingTool {
        round: usize,
        current: ToolCall,
        remaining: Vec<ToolCall>,
    },
    EmittingFinalAnswer {
        text: String,
    },
    Done,
}

impl TurnPhase {
    pub fn start() -> Self {
        TurnPhase::AwaitingModelDecision { round: 1 }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TurnPhase::Done)
    }
}

/// Immutable limits a transition is checked against
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext {
    pub max_rounds: usize,
}

impl DispatchContext {
    pub fn new(max_rounds: usize) -> Self {
        Self { max_rounds }
    }
}
