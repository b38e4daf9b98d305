//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ErrorResponse, HealthResponse};
use super::AppState;
use crate::ag_ui::{context_addendum, to_llm_history, Event, RunAgentInput};
use crate::session::TurnGuard;
use crate::state::ConversationState;
use crate::turn::{TurnDispatcher, TurnError, TurnRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Events buffered between the turn task and a slow client
const EVENT_BUFFER: usize = 64;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // AG-UI clients post either to the mount root or to /run
        .route("/", post(run_agent))
        .route("/run", post(run_agent))
        .route("/health", get(health))
        .route("/sessions/:thread_id/state", get(get_session_state))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_session_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ConversationState>, AppError> {
    let session = state
        .sessions
        .get(&thread_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No session for thread {thread_id}")))?;
    Ok(Json(session.state().get()))
}

async fn run_agent(
    State(state): State<AppState>,
    Json(input): Json<RunAgentInput>,
) -> Result<Response, AppError> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let client_state = input
        .conversation_state()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let session = state.sessions.get_or_create(&input.thread_id).await;
    let guard = session
        .try_begin_turn()
        .ok_or_else(|| AppError::Conflict("agent is busy".to_string()))?;

    // Client state is authoritative at run start
    if let Some(client_state) = client_state {
        session.state().set(client_state);
    }

    let (mut extra_system, history) = to_llm_history(&input.messages);
    extra_system.extend(context_addendum(&input.context));

    tracing::info!(
        session_id = %session.id(),
        run_id = %input.run_id,
        parent_run_id = ?input.parent_run_id,
        messages = input.messages.len(),
        client_tools = ?input.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        forwarded_props = input.forwarded_props.is_some(),
        "Run requested"
    );

    let task = RunTask {
        dispatcher: state.dispatcher.clone(),
        request: TurnRequest {
            session_id: session.id().to_string(),
            state: session.state().clone(),
            extra_system,
            history,
        },
        thread_id: input.thread_id,
        run_id: input.run_id,
        timeout: state.turn_timeout,
        cancel: state.sessions.turn_token(),
        guard,
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(task.drive(tx));

    Ok(sse_stream(rx).into_response())
}

/// One run, executed off the request task so events stream as they happen
struct RunTask {
    dispatcher: Arc<TurnDispatcher>,
    request: TurnRequest,
    thread_id: String,
    run_id: String,
    timeout: Duration,
    cancel: CancellationToken,
    /// Held until the run ends so the session stays busy
    guard: TurnGuard,
}

impl RunTask {
    async fn drive(self, tx: mpsc::Sender<Event>) {
        let session_id = self.request.session_id.clone();

        if tx
            .send(Event::run_started(&self.thread_id, &self.run_id))
            .await
            .is_err()
        {
            tracing::info!(session_id = %session_id, "Client left before run started");
            return;
        }

        let turn = self.dispatcher.run_turn(self.request, &tx, &self.cancel);
        let result = match tokio::time::timeout(self.timeout, turn).await {
            Ok(result) => result,
            Err(_) => {
                self.cancel.cancel();
                tracing::warn!(
                    session_id = %session_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Turn timed out"
                );
                Err(TurnError::Cancelled)
            }
        };

        // Free the session before the client hears the run is over
        drop(self.guard);

        let terminal = match result {
            Ok(outcome) => {
                tracing::info!(
                    session_id = %session_id,
                    run_id = %self.run_id,
                    rounds = outcome.rounds,
                    answer_chars = outcome.final_text.chars().count(),
                    "Run finished"
                );
                Event::run_finished(&self.thread_id, &self.run_id, None)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    run_id = %self.run_id,
                    error = %e,
                    code = e.code(),
                    "Run failed"
                );
                Event::run_error(e.to_string(), Some(e.code().to_string()))
            }
        };

        if tx.send(terminal).await.is_err() {
            tracing::debug!(session_id = %session_id, "Client gone before terminal event");
        }
    }
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
