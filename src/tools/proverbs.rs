//! Tools over the proverb list

use super::{parse_input, Tool, ToolContext, ToolError, ToolOutput};
use crate::state::{ConversationState, StateChangeEvent};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ProverbsInput {
    proverbs: Vec<String>,
}

fn proverbs_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "required": ["proverbs"],
        "properties": {
            "proverbs": {
                "type": "array",
                "items": {"type": "string"},
                "description": description
            }
        }
    })
}

/// Append proverbs in the given order
pub struct AddProverbsTool;

#[async_trait]
impl Tool for AddProverbsTool {
    fn name(&self) -> &'static str {
        "add_proverbs"
    }

    fn description(&self) -> String {
        "Add one or more proverbs to the end of the list.".to_string()
    }

    fn input_schema(&self) -> Value {
        proverbs_schema("The proverbs to append")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: ProverbsInput = parse_input(self.name(), input)?;
        let state = ctx.state.update(|s| s.proverbs.extend(input.proverbs));
        Ok(ToolOutput::StateChanged(StateChangeEvent::snapshot(state)))
    }
}

/// Replace the whole list
pub struct SetProverbsTool;

#[async_trait]
impl Tool for SetProverbsTool {
    fn name(&self) -> &'static str {
        "set_proverbs"
    }

    fn description(&self) -> String {
        "Replace the entire list of proverbs.".to_string()
    }

    fn input_schema(&self) -> Value {
        proverbs_schema("The complete new list of proverbs")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: ProverbsInput = parse_input(self.name(), input)?;
        let state = ctx.state.update(|s| s.proverbs = input.proverbs);
        Ok(ToolOutput::StateChanged(StateChangeEvent::snapshot(state)))
    }
}

/// Show proverbs to the user.
///
/// The snapshot echoes the tool input; the store is neither read nor written.
pub struct DisplayProverbsTool;

#[async_trait]
impl Tool for DisplayProverbsTool {
    fn name(&self) -> &'static str {
        "display_proverbs"
    }

    fn description(&self) -> String {
        "Display the current list of proverbs to the user.".to_string()
    }

    fn input_schema(&self) -> Value {
        proverbs_schema("The proverbs to display")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: ProverbsInput = parse_input(self.name(), input)?;
        tracing::info!(session_id = %ctx.session_id, proverbs = ?input.proverbs, "Displaying proverbs");
        Ok(ToolOutput::StateChanged(StateChangeEvent::snapshot(
            ConversationState::new(input.proverbs),
        )))
    }
}
