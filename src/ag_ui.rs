//! AG-UI protocol surface: run input, emitted events, and the mapping from
//! AG-UI message history to model messages.

mod events;
mod types;

pub use events::Event;
pub use types::{Context, Message, RunAgentInput};

use types::Role;

use crate::llm::{ContentBlock, LlmMessage, MessageRole, SystemContent};
use serde_json::Value;

/// Split AG-UI history into extra system text and model messages.
///
/// System and developer messages become system blocks appended after the
/// agent's own instructions. Tool messages become tool results on a user
/// message, with consecutive results grouped together.
pub fn to_llm_history(messages: &[Message]) -> (Vec<SystemContent>, Vec<LlmMessage>) {
    let mut system = Vec::new();
    let mut history: Vec<LlmMessage> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System | Role::Developer => {
                if !msg.text().trim().is_empty() {
                    system.push(SystemContent::new(msg.text()));
                }
            }
            Role::User => history.push(LlmMessage::user(msg.text())),
            Role::Assistant => {
                let mut content = Vec::new();
                if !msg.text().is_empty() {
                    content.push(ContentBlock::text(msg.text()));
                }
                for call in &msg.tool_calls {
                    let input = serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                    content.push(ContentBlock::tool_use(&call.id, &call.function.name, input));
                }
                if !content.is_empty() {
                    history.push(LlmMessage::assistant(content));
                }
            }
            Role::Tool => {
                let Some(tool_call_id) = msg.tool_call_id.as_deref() else {
                    tracing::warn!(message_id = ?msg.id, "Dropping tool message without toolCallId");
                    continue;
                };
                let block = ContentBlock::tool_result(tool_call_id, msg.text(), false);
                match history.last_mut() {
                    Some(last)
                        if last.role == MessageRole::User
                            && last
                                .content
                                .iter()
                                .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block);
                    }
                    _ => history.push(LlmMessage {
                        role: MessageRole::User,
                        content: vec![block],
                    }),
                }
            }
        }
    }

    (system, history)
}

/// Render frontend context entries as a system block
pub fn context_addendum(context: &[Context]) -> Option<SystemContent> {
    if context.is_empty() {
        return None;
    }
    let lines = context
        .iter()
        .map(|entry| {
            let value = match &entry.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("[{}]: {value}", entry.description)
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(SystemContent::new(format!(
        "The following context is available from the frontend:\n{lines}"
    )))
}
