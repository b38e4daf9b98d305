use super::{parse_input, Tool, ToolContext, ToolError, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Canned weather report; does not touch state
pub struct GetWeatherTool;

#[derive(Debug, Deserialize)]
struct WeatherInput {
    location: String,
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> String {
        "Get the weather for a given location. Ensure location is fully spelled out.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["location"],
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The location to report on"
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> Result<ToolOutput, ToolError> {
        let input: WeatherInput = parse_input(self.name(), input)?;
        Ok(ToolOutput::Text(format!(
            "The weather in {} is sunny.",
            input.location
        )))
    }
}
