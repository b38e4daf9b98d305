//! Sessions keyed by AG-UI thread id
//!
//! Each session owns one [`StateStore`] and runs at most one turn at a time.
//! Sessions idle for longer than the configured TTL are evicted by a
//! background sweeper, which discards their state.

use crate::state::{ConversationState, StateStore};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct Session {
    id: String,
    state: StateStore,
    turn_lock: Arc<Mutex<()>>,
    last_used: Arc<std::sync::Mutex<Instant>>,
}

/// Proof that the holder is the only turn running on a session.
/// Dropping it marks the session as used.
pub struct TurnGuard {
    _lock: OwnedMutexGuard<()>,
    last_used: Arc<std::sync::Mutex<Instant>>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        stamp(&self.last_used);
    }
}

fn stamp(last_used: &std::sync::Mutex<Instant>) {
    *last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            state: StateStore::new(ConversationState::default()),
            turn_lock: Arc::new(Mutex::new(())),
            last_used: Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Claim the session for a turn, or `None` if one is already running
    pub fn try_begin_turn(&self) -> Option<TurnGuard> {
        self.turn_lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|lock| {
                stamp(&self.last_used);
                TurnGuard {
                    _lock: lock,
                    last_used: self.last_used.clone(),
                }
            })
    }

    fn touch(&self) {
        stamp(&self.last_used);
    }

    /// Idle for at least `ttl` with no turn running
    fn is_expired(&self, ttl: Duration) -> bool {
        let idle = self
            .last_used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed();
        idle >= ttl && self.turn_lock.try_lock().is_ok()
    }
}

/// Registry of live sessions plus the root cancellation token every turn
/// derives from.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    root: CancellationToken,
    idle_ttl: Duration,
}

impl SessionManager {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
            idle_ttl,
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.get(id).await {
            session.touch();
            return session;
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = %id, "Created session");
                Arc::new(Session::new(id.to_string()))
            })
            .clone();
        session.touch();
        session
    }

    /// Drop sessions idle past the TTL. Busy sessions are kept.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.is_expired(self.idle_ttl);
            if expired {
                tracing::info!(session_id = %id, "Evicting idle session");
            }
            !expired
        });
        before - sessions.len()
    }

    /// Sweep idle sessions every `period` until shutdown
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = manager.root.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = manager.evict_idle().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "Session sweep");
                        }
                    }
                }
            }
        })
    }

    /// Token for a new turn; cancelled when the manager shuts down
    pub fn turn_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancel every in-flight turn and drop all sessions
    pub async fn shutdown(&self) {
        self.root.cancel();
        let mut sessions = self.sessions.write().await;
        tracing::info!(sessions = sessions.len(), "Shutting down sessions");
        sessions.clear();
    }
}
