//! Pure turn transition function
//!
//! Given the same phase, context and event it always produces the same
//! result. All I/O happens in the dispatcher that executes the effects.

use super::effect::Effect;
use super::event::TurnEvent;
use super::phase::{Decision, DispatchContext, ToolCall, TurnPhase};
use thiserror::Error;

/// Result of a phase transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_phase: TurnPhase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(phase: TurnPhase) -> Self {
        Self {
            new_phase: phase,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Turn already finished")]
    TurnFinished,
    #[error("Model requested tools for more than {0} rounds")]
    RoundLimit(usize),
}

pub fn transition(
    phase: &TurnPhase,
    context: &DispatchContext,
    event: TurnEvent,
) -> Result<TransitionResult, TransitionError> {
    match (phase, event) {
        (TurnPhase::Done, _) => Err(TransitionError::TurnFinished),

        // A tool-call decision with nothing in it is a (possibly empty) answer
        (
            TurnPhase::AwaitingModelDecision { .. },
            TurnEvent::ModelDecided(Decision::ToolCalls { text, calls }),
        ) if calls.is_empty() => Ok(final_answer(text.unwrap_or_default())),

        (
            TurnPhase::AwaitingModelDecision { round },
            TurnEvent::ModelDecided(Decision::ToolCalls { text, calls }),
        ) => {
            // Running these tools commits us to another consultation
            if *round >= context.max_rounds {
                return Err(TransitionError::RoundLimit(context.max_rounds));
            }

            let mut queue = calls.clone();
            let current = queue.remove(0);
            let emit_text = text.clone().filter(|t| !t.is_empty()).map(Effect::EmitText);

            Ok(TransitionResult::new(TurnPhase::ExecutingTool {
                round: *round,
                current: current.clone(),
                remaining: queue,
            })
            .with_effect(Effect::RecordAssistant { text, calls })
            .with_effects(emit_text)
            .with_effect(Effect::ExecuteTool(current)))
        }

        (
            TurnPhase::AwaitingModelDecision { .. },
            TurnEvent::ModelDecided(Decision::FinalAnswer(text)),
        ) => Ok(final_answer(text)),

        (
            TurnPhase::ExecutingTool {
                round,
                current,
                remaining,
            },
            TurnEvent::ToolCompleted {
                call_id,
                content,
                is_error,
            },
        ) => {
            if call_id != current.id {
                return Err(TransitionError::InvalidTransition(format!(
                    "result for {call_id} while executing {}",
                    current.id
                )));
            }

            let record = Effect::RecordToolResult {
                call_id,
                content,
                is_error,
            };

            Ok(match remaining.split_first() {
                Some((next, rest)) => TransitionResult::new(TurnPhase::ExecutingTool {
                    round: *round,
                    current: next.clone(),
                    remaining: rest.to_vec(),
                })
                .with_effect(record)
                .with_effect(Effect::ExecuteTool(next.clone())),
                None => TransitionResult::new(TurnPhase::AwaitingModelDecision { round: round + 1 })
                    .with_effect(record)
                    .with_effect(Effect::RequestDecision),
            })
        }

        (TurnPhase::EmittingFinalAnswer { .. }, TurnEvent::AnswerDelivered) => {
            Ok(TransitionResult::new(TurnPhase::Done).with_effect(Effect::Finish))
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {phase:?}"
        ))),
    }
}

fn final_answer(text: String) -> TransitionResult {
    TransitionResult::new(TurnPhase::EmittingFinalAnswer { text: text.clone() })
        .with_effect(Effect::RecordAssistant {
            text: Some(text.clone()),
            calls: Vec::<ToolCall>::new(),
        })
        .with_effect(Effect::EmitFinalAnswer(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> DispatchContext {
        DispatchContext::new(8)
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, json!({"proverbs": [id]}))
    }

    #[test]
    fn test_final_answer_path() {
        let result = transition(
            &TurnPhase::start(),
            &ctx(),
            TurnEvent::ModelDecided(Decision::FinalAnswer("Done.".into())),
        )
        .unwrap();
        assert_eq!(
            result.new_phase,
            TurnPhase::EmittingFinalAnswer {
                text: "Done.".into()
            }
        );
        assert_eq!(
            result.effects.last(),
            Some(&Effect::EmitFinalAnswer("Done.".into()))
        );

        let result = transition(&result.new_phase, &ctx(), TurnEvent::AnswerDelivered).unwrap();
        assert!(result.new_phase.is_done());
        assert_eq!(result.effects, vec![Effect::Finish]);
    }

    #[test]
    fn test_tool_calls_run_in_order_then_reconsult() {
        let calls = vec![call("c1", "set_proverbs"), call("c2", "add_proverbs")];
        let result = transition(
            &TurnPhase::start(),
            &ctx(),
            TurnEvent::ModelDecided(Decision::ToolCalls {
                text: Some("On it".into()),
                calls: calls.clone(),
            }),
        )
        .unwrap();

        assert_eq!(
            result.effects,
            vec![
                Effect::RecordAssistant {
                    text: Some("On it".into()),
                    calls: calls.clone()
                },
                Effect::EmitText("On it".into()),
                Effect::ExecuteTool(calls[0].clone()),
            ]
        );

        let result = transition(
            &result.new_phase,
            &ctx(),
            TurnEvent::ToolCompleted {
                call_id: "c1".into(),
                content: "{}".into(),
                is_error: false,
            },
        )
        .unwrap();
        assert_eq!(result.effects[1], Effect::ExecuteTool(calls[1].clone()));

        let result = transition(
            &result.new_phase,
            &ctx(),
            TurnEvent::ToolCompleted {
                call_id: "c2".into(),
                content: "oops".into(),
                is_error: true,
            },
        )
        .unwrap();
        assert_eq!(
            result.new_phase,
            TurnPhase::AwaitingModelDecision { round: 2 }
        );
        assert_eq!(result.effects.last(), Some(&Effect::RequestDecision));
    }

    #[test]
    fn test_mismatched_result_rejected() {
        let phase = TurnPhase::ExecutingTool {
            round: 1,
            current: call("c1", "set_proverbs"),
            remaining: vec![],
        };
        let err = transition(
            &phase,
            &ctx(),
            TurnEvent::ToolCompleted {
                call_id: "zz".into(),
                content: String::new(),
                is_error: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn test_round_limit() {
        let err = transition(
            &TurnPhase::AwaitingModelDecision { round: 2 },
            &DispatchContext::new(2),
            TurnEvent::ModelDecided(Decision::ToolCalls {
                text: None,
                calls: vec![call("c1", "get_weather")],
            }),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::RoundLimit(2));
    }

    #[test]
    fn test_empty_tool_calls_is_final_answer() {
        let result = transition(
            &TurnPhase::start(),
            &ctx(),
            TurnEvent::ModelDecided(Decision::ToolCalls {
                text: None,
                calls: vec![],
            }),
        )
        .unwrap();
        assert_eq!(
            result.new_phase,
            TurnPhase::EmittingFinalAnswer {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_done_rejects_everything() {
        let err = transition(&TurnPhase::Done, &ctx(), TurnEvent::AnswerDelivered).unwrap_err();
        assert_eq!(err, TransitionError::TurnFinished);
    }
}
