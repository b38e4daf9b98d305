//! Turn dispatcher
//!
//! Implements the Elm Architecture pattern: a pure `transition` function
//! moves a turn between phases and returns effects, and the dispatcher
//! executes those effects and feeds the resulting events back in.

mod dispatcher;
mod effect;
mod event;
mod phase;
mod transition;

#[cfg(test)]
mod proptests;

pub use dispatcher::{TurnDispatcher, TurnRequest};
pub use effect::Effect;
pub use event::TurnEvent;
pub use phase::{Decision, DispatchContext, ToolCall, TurnPhase};
pub use transition::{transition, TransitionError};

use crate::llm::LlmError;
use thiserror::Error;

/// Why a turn ended without a final answer
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Model call failed: {0}")]
    ModelCall(#[from] LlmError),
    #[error("Turn cancelled")]
    Cancelled,
    #[error("Model requested tools for more than {0} rounds")]
    RoundLimit(usize),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TurnError {
    /// Stable code for the `RUN_ERROR` event
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelCall(e) => e.kind.code(),
            Self::Cancelled => "cancelled",
            Self::RoundLimit(_) => "round_limit",
            Self::InvalidTransition(_) => "internal",
        }
    }
}

impl From<TransitionError> for TurnError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::RoundLimit(max) => Self::RoundLimit(max),
            TransitionError::InvalidTransition(reason) => Self::InvalidTransition(reason),
            TransitionError::TurnFinished => {
                Self::InvalidTransition("Turn already finished".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TurnError::from(LlmError::rate_limit("slow")).code(),
            "rate_limit"
        );
        assert_eq!(TurnError::Cancelled.code(), "cancelled");
        assert_eq!(TurnError::RoundLimit(3).code(), "round_limit");
        assert_eq!(
            TurnError::RoundLimit(3).to_string(),
            "Model requested tools for more than 3 rounds"
        );
    }

    #[test]
    fn test_transition_errors_map_without_double_prefix() {
        let err = TurnError::from(TransitionError::InvalidTransition(
            "tool result for c2 while executing c1".into(),
        ));
        assert_eq!(
            err.to_string(),
            "Invalid transition: tool result for c2 while executing c1"
        );
        assert_eq!(err.code(), "internal");

        assert!(matches!(
            TurnError::from(TransitionError::RoundLimit(4)),
            TurnError::RoundLimit(4)
        ));
        assert_eq!(
            TurnError::from(TransitionError::TurnFinished).to_string(),
            "Invalid transition: Turn already finished"
        );
    }
}
