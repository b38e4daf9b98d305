//! Executes turn effects: model consultations, tool calls, history
//! bookkeeping and AG-UI event emission.

use super::{
    transition, Decision, DispatchContext, Effect, ToolCall, TurnError,
    TurnEvent, TurnPhase,
};
use crate::ag_ui::Event;
use crate::config::AgentProfile;
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmService, MessageRole, SystemContent};
use crate::state::StateStore;
use crate::system_prompt::build_system_prompt;
use crate::tools::{ToolContext, ToolRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Input for one turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub state: StateStore,
    /// System text supplied by the client, placed after the agent's own
    pub extra_system: Vec<SystemContent>,
    pub history: Vec<LlmMessage>,
}

/// What a completed turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub final_text: String,
    /// Model consultations made
    pub rounds: usize,
}

/// Drives turns for every session. Holds no per-session state.
pub struct TurnDispatcher {
    llm: Arc<dyn LlmService>,
    registry: Arc<ToolRegistry>,
    profile: AgentProfile,
    context: DispatchContext,
    max_tokens: Option<u32>,
}

/// Mutable bookkeeping for a turn in flight
struct TurnRun<'a> {
    request: TurnRequest,
    rounds: usize,
    final_text: String,
    sink: &'a mpsc::Sender<Event>,
    cancel: &'a CancellationToken,
}

impl TurnDispatcher {
    pub fn new(
        llm: Arc<dyn LlmService>,
        registry: Arc<ToolRegistry>,
        profile: AgentProfile,
        max_rounds: usize,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            llm,
            registry,
            profile,
            context: DispatchContext::new(max_rounds),
            max_tokens,
        }
    }

    /// Run one turn to completion, forwarding AG-UI events to `sink` as they
    /// are produced. Run lifecycle events are the caller's job.
    ///
    /// State mutations made by tools before a failure are kept.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        sink: &mpsc::Sender<Event>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let mut run = TurnRun {
            request,
            rounds: 0,
            final_text: String::new(),
            sink,
            cancel,
        };

        tracing::info!(session_id = %run.request.session_id, "Starting turn");

        let mut phase = TurnPhase::start();
        let mut events_to_process = Vec::new();
        if let Some(event) = self.execute_effect(Effect::RequestDecision, &mut run).await? {
            events_to_process.push(event);
        }

        while let Some(current_event) = events_to_process.pop() {
            let result = transition(&phase, &self.context, current_event)?;
            phase = result.new_phase;

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(effect, &mut run).await? {
                    events_to_process.push(generated);
                }
            }
        }

        if !phase.is_done() {
            return Err(TurnError::InvalidTransition(format!(
                "turn stalled in {phase:?}"
            )));
        }

        tracing::info!(
            session_id = %run.request.session_id,
            rounds = run.rounds,
            "Turn complete"
        );

        Ok(TurnOutcome {
            final_text: run.final_text,
            rounds: run.rounds,
        })
    }

    async fn execute_effect(
        &self,
        effect: Effect,
        run: &mut TurnRun<'_>,
    ) -> Result<Option<TurnEvent>, TurnError> {
        match effect {
            Effect::RequestDecision => {
                run.rounds += 1;
                let state = run.request.state.get();
                let mut system = vec![SystemContent::new(build_system_prompt(self.profile, &state))];
                system.extend(run.request.extra_system.iter().cloned());

                let llm_request = LlmRequest {
                    system,
                    messages: run.request.history.clone(),
                    tools: self.registry.definitions(),
                    max_tokens: self.max_tokens,
                };

                tracing::debug!(
                    session_id = %run.request.session_id,
                    round = run.rounds,
                    messages = llm_request.messages.len(),
                    "Requesting model decision"
                );

                let response = tokio::select! {
                    biased;
                    () = run.cancel.cancelled() => return Err(TurnError::Cancelled),
                    result = self.llm.complete(&llm_request) => result?,
                };

                Ok(Some(TurnEvent::ModelDecided(Decision::from_response(&response))))
            }

            Effect::RecordAssistant { text, calls } => {
                let mut content = Vec::new();
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    content.push(ContentBlock::text(text));
                }
                content.extend(calls.iter().map(ToolCall::to_content_block));
                if !content.is_empty() {
                    run.request.history.push(LlmMessage::assistant(content));
                }
                Ok(None)
            }

            Effect::EmitText(text) => {
                emit_text(run, &text).await?;
                Ok(None)
            }

            Effect::ExecuteTool(call) => self.execute_tool(call, run).await.map(Some),

            Effect::RecordToolResult {
                call_id,
                content,
                is_error,
            } => {
                let block = ContentBlock::tool_result(call_id, content, is_error);
                match run.request.history.last_mut() {
                    Some(last)
                        if last.role == MessageRole::User
                            && matches!(last.content.first(), Some(ContentBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block);
                    }
                    _ => run.request.history.push(LlmMessage {
                        role: MessageRole::User,
                        content: vec![block],
                    }),
                }
                Ok(None)
            }

            Effect::EmitFinalAnswer(text) => {
                emit_text(run, &text).await?;
                run.final_text = text;
                Ok(Some(TurnEvent::AnswerDelivered))
            }

            Effect::Finish => Ok(None),
        }
    }

    async fn execute_tool(
        &self,
        call: ToolCall,
        run: &mut TurnRun<'_>,
    ) -> Result<TurnEvent, TurnError> {
        let session_id = run.request.session_id.clone();
        tracing::info!(session_id = %session_id, tool = %call.name, call_id = %call.id, "Executing tool");

        emit(run, Event::tool_call_start(&call.id, &call.name, None)).await?;
        emit(run, Event::tool_call_args(&call.id, call.input.to_string())).await?;
        emit(run, Event::tool_call_end(&call.id)).await?;

        let ctx = ToolContext::new(
            session_id,
            run.request.state.clone(),
            run.cancel.child_token(),
        );

        let result = tokio::select! {
            biased;
            () = run.cancel.cancelled() => return Err(TurnError::Cancelled),
            result = self.registry.invoke(&call.name, call.input.clone(), ctx) => result,
        };

        let (content, is_error) = match result {
            Ok(output) => {
                if let Some(event) = output.state_event() {
                    tracing::debug!(
                        session_id = %run.request.session_id,
                        kind = ?event.kind(),
                        proverbs = event.state().proverbs.len(),
                        "Forwarding state event"
                    );
                    emit(run, Event::state_snapshot(event.to_value())).await?;
                }
                (output.content(), false)
            }
            Err(e) => (e.to_string(), true),
        };

        emit(
            run,
            Event::tool_call_result(Uuid::new_v4().to_string(), &call.id, content.clone()),
        )
        .await?;

        Ok(TurnEvent::ToolCompleted {
            call_id: call.id,
            content,
            is_error,
        })
    }
}

async fn emit(run: &TurnRun<'_>, event: Event) -> Result<(), TurnError> {
    run.sink.send(event).await.map_err(|_| {
        tracing::info!(session_id = %run.request.session_id, "Client went away, cancelling turn");
        run.cancel.cancel();
        TurnError::Cancelled
    })
}

async fn emit_text(run: &TurnRun<'_>, text: &str) -> Result<(), TurnError> {
    if text.is_empty() {
        return Ok(());
    }
    let message_id = Uuid::new_v4().to_string();
    emit(run, Event::text_message_start(&message_id)).await?;
    emit(run, Event::text_message_content(&message_id, text)).await?;
    emit(run, Event::text_message_end(&message_id)).await
}
