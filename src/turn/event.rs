//! Events that drive a turn forward

use super::phase::Decision;

#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// The model answered a consultation
    ModelDecided(Decision),

    /// A tool call finished; failures arrive here too, as `is_error`
    ToolCompleted {
        call_id: String,
        content: String,
        is_error: bool,
    },

    /// The final answer reached the client
    AnswerDelivered,
}
