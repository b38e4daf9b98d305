//! Property-based tests for the turn transition function

use super::*;
use proptest::prelude::*;
use serde_json::json;

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    (
        "[a-z0-9]{6}",
        prop_oneof![
            Just("add_proverbs"),
            Just("set_proverbs"),
            Just("display_proverbs"),
            Just("get_weather"),
            Just("unknown_tool"),
        ],
        prop::collection::vec("[a-z ]{0,12}", 0..4),
    )
        .prop_map(|(id, name, proverbs)| ToolCall::new(id, name, json!({ "proverbs": proverbs })))
}

fn arb_calls() -> impl Strategy<Value = Vec<ToolCall>> {
    prop::collection::vec(arb_tool_call(), 1..6)
}

fn arb_event() -> impl Strategy<Value = TurnEvent> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(|t| TurnEvent::ModelDecided(Decision::FinalAnswer(t))),
        (proptest::option::of("[a-z ]{0,20}"), prop::collection::vec(arb_tool_call(), 0..4))
            .prop_map(|(text, calls)| TurnEvent::ModelDecided(Decision::ToolCalls { text, calls })),
        ("[a-z0-9]{6}", any::<bool>()).prop_map(|(call_id, is_error)| TurnEvent::ToolCompleted {
            call_id,
            content: String::new(),
            is_error,
        }),
        Just(TurnEvent::AnswerDelivered),
    ]
}

fn arb_phase() -> impl Strategy<Value = TurnPhase> {
    prop_oneof![
        (1usize..10).prop_map(|round| TurnPhase::AwaitingModelDecision { round }),
        (1usize..10, arb_tool_call(), prop::collection::vec(arb_tool_call(), 0..3)).prop_map(
            |(round, current, remaining)| TurnPhase::ExecutingTool {
                round,
                current,
                remaining,
            }
        ),
        "[a-z ]{0,20}".prop_map(|text| TurnPhase::EmittingFinalAnswer { text }),
        Just(TurnPhase::Done),
    ]
}

fn complete(call: &ToolCall) -> TurnEvent {
    TurnEvent::ToolCompleted {
        call_id: call.id.clone(),
        content: "ok".into(),
        is_error: false,
    }
}

proptest! {
    #[test]
    fn done_is_terminal(event in arb_event()) {
        let result = transition(&TurnPhase::Done, &DispatchContext::new(8), event);
        prop_assert_eq!(result.unwrap_err(), TransitionError::TurnFinished);
    }

    #[test]
    fn at_most_one_effect_yields_an_event(phase in arb_phase(), event in arb_event()) {
        if let Ok(result) = transition(&phase, &DispatchContext::new(8), event) {
            let producing = result
                .effects
                .iter()
                .filter(|e| matches!(
                    e,
                    Effect::RequestDecision | Effect::ExecuteTool(_) | Effect::EmitFinalAnswer(_)
                ))
                .count();
            if result.new_phase.is_done() {
                prop_assert_eq!(producing, 0);
            } else {
                prop_assert_eq!(producing, 1);
            }
        }
    }

    #[test]
    fn tools_execute_in_model_order(calls in arb_calls(), round in 1usize..4) {
        let ctx = DispatchContext::new(8);
        let mut result = transition(
            &TurnPhase::AwaitingModelDecision { round },
            &ctx,
            TurnEvent::ModelDecided(Decision::ToolCalls { text: None, calls: calls.clone() }),
        ).unwrap();

        let mut executed = Vec::new();
        let mut recorded = 0;
        loop {
            for effect in &result.effects {
                match effect {
                    Effect::ExecuteTool(call) => executed.push(call.clone()),
                    Effect::RecordToolResult { .. } => recorded += 1,
                    _ => {}
                }
            }
            match &result.new_phase {
                TurnPhase::ExecutingTool { current, .. } => {
                    let event = complete(current);
                    result = transition(&result.new_phase, &ctx, event).unwrap();
                }
                other => {
                    prop_assert_eq!(other, &TurnPhase::AwaitingModelDecision { round: round + 1 });
                    prop_assert_eq!(result.effects.last(), Some(&Effect::RequestDecision));
                    break;
                }
            }
        }

        prop_assert_eq!(executed, calls.clone());
        prop_assert_eq!(recorded, calls.len());
    }

    #[test]
    fn tool_rounds_are_bounded(calls in arb_calls(), max_rounds in 1usize..6) {
        let ctx = DispatchContext::new(max_rounds);
        let result = transition(
            &TurnPhase::AwaitingModelDecision { round: max_rounds },
            &ctx,
            TurnEvent::ModelDecided(Decision::ToolCalls { text: None, calls }),
        );
        prop_assert_eq!(result.unwrap_err(), TransitionError::RoundLimit(max_rounds));
    }

    #[test]
    fn final_answer_always_reachable(round in 1usize..20, text in "[a-z ]{0,30}") {
        let ctx = DispatchContext::new(8);
        let result = transition(
            &TurnPhase::AwaitingModelDecision { round },
            &ctx,
            TurnEvent::ModelDecided(Decision::FinalAnswer(text.clone())),
        ).unwrap();
        prop_assert_eq!(&result.new_phase, &TurnPhase::EmittingFinalAnswer { text });

        let done = transition(&result.new_phase, &ctx, TurnEvent::AnswerDelivered).unwrap();
        prop_assert!(done.new_phase.is_done());
    }
}
