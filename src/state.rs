//! Conversation state and the per-session store that guards it

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// The mutable domain object tools read and write.
///
/// Insertion order is significant and duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub proverbs: Vec<String>,
}

impl ConversationState {
    pub fn new(proverbs: Vec<String>) -> Self {
        Self { proverbs }
    }
}

/// Kind tag carried by a [`StateChangeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateEventKind {
    Snapshot,
}

/// Immutable record produced after a state-touching tool runs.
///
/// The payload is a deep copy, so later store mutations never leak into an
/// event that has already been handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeEvent {
    kind: StateEventKind,
    snapshot: ConversationState,
}

impl StateChangeEvent {
    pub fn snapshot(state: ConversationState) -> Self {
        Self {
            kind: StateEventKind::Snapshot,
            snapshot: state,
        }
    }

    pub fn kind(&self) -> StateEventKind {
        self.kind
    }

    pub fn state(&self) -> &ConversationState {
        &self.snapshot
    }

    /// Payload as JSON, as it goes out on the wire and back to the model
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.snapshot).unwrap_or(serde_json::Value::Null)
    }
}

/// Shared handle to one session's state.
///
/// Cloning shares the underlying state. Reads and writes take a short
/// critical section and never hold the lock across an await point.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<ConversationState>>,
}

impl StateStore {
    pub fn new(initial: ConversationState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self) -> ConversationState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, state: ConversationState) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Apply a mutation and return the resulting state in one critical section
    pub fn update<F>(&self, f: F) -> ConversationState
    where
        F: FnOnce(&mut ConversationState),
    {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        guard.clone()
    }
}
