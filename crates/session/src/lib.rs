//! # Ragline Session
//!
//! In-memory implementation of the session collaborator. Real
//! deployments point the `SessionStore` trait at an external history
//! service; this backend covers tests and ephemeral single-process runs.

use async_trait::async_trait;
use ragline_core::error::SessionError;
use ragline_core::session::{SessionStore, SessionTurn};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// An in-memory session store: ordered turns per session id.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<SessionTurn>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_history(&self, session_id: &str) -> Result<Vec<SessionTurn>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append_turn(&self, session_id: &str, turn: SessionTurn) -> Result<(), SessionError> {
        debug!(session_id = %session_id, "Appending session turn");
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().push(turn);
        Ok(())
    }
}
