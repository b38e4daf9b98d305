//! HTTP API: AG-UI run endpoint plus health and session inspection

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::session::SessionManager;
use crate::turn::TurnDispatcher;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<TurnDispatcher>,
    pub turn_timeout: Duration,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<TurnDispatcher>,
        turn_timeout: Duration,
        session_idle_ttl: Duration,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(session_idle_ttl)),
            dispatcher,
            turn_timeout,
        }
    }

    /// Cancel in-flight turns and drop every session
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
