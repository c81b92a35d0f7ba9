//! Session store contract (C9).
//!
//! A session groups a sequence of runs under one id, with expiry for cleanup.
//! Concrete backends are out of scope; `InMemorySessionStore` is the reference
//! implementation used by tests, serializing writes per session via a mutex so
//! concurrent `add_run` calls on the same session don't interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::state::AgentState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// One completed or in-flight run recorded against a session.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub state: AgentState,
    pub created_at: SystemTime,
}

/// A session: a named thread of runs plus a last-activity timestamp used for expiry.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub runs: Vec<RunRecord>,
    pub last_active_at: SystemTime,
}

impl Session {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            runs: Vec::new(),
            last_active_at: SystemTime::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_active_at
            .elapsed()
            .map(|elapsed| elapsed > ttl)
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches a session, creating it if it doesn't exist yet.
    async fn get_session(&self, session_id: &str) -> Result<Session, SessionError>;

    /// Persists a session's full state (used after external mutation, e.g. renaming).
    async fn save_session(&self, session: &Session) -> Result<(), SessionError>;

    /// Appends a run record to a session, creating the session if needed, and
    /// bumps `last_active_at`.
    async fn add_run(&self, session_id: &str, run: RunRecord) -> Result<(), SessionError>;

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError>;

    /// Removes sessions whose `last_active_at` is older than `ttl`; returns how many were removed.
    async fn cleanup_expired(&self, ttl: Duration) -> Result<usize, SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id.to_string()))
            .clone())
    }

    async fn save_session(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .lock()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn add_run(&self, session_id: &str, run: RunRecord) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id.to_string()));
        session.runs.push(run);
        session.last_active_at = SystemTime::now();
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.sessions.lock().await.keys().cloned().collect())
    }

    async fn cleanup_expired(&self, ttl: Duration) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(ttl));
        Ok(before - sessions.len())
    }
}

pub type SharedSessionStore = Arc<dyn SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_session_creates_it_on_first_access() {
        let store = InMemorySessionStore::new();
        let session = store.get_session("s1").await.unwrap();
        assert_eq!(session.session_id, "s1");
        assert!(session.runs.is_empty());
    }

    #[tokio::test]
    async fn add_run_appends_and_bumps_activity() {
        let store = InMemorySessionStore::new();
        store
            .add_run(
                "s1",
                RunRecord {
                    run_id: "r1".into(),
                    state: AgentState::new(5),
                    created_at: SystemTime::now(),
                },
            )
            .await
            .unwrap();
        let session = store.get_session("s1").await.unwrap();
        assert_eq!(session.runs.len(), 1);
        assert_eq!(session.runs[0].run_id, "r1");
    }

    #[tokio::test]
    async fn list_sessions_reflects_all_created_sessions() {
        let store = InMemorySessionStore::new();
        store.get_session("a").await.unwrap();
        store.get_session("b").await.unwrap();
        let mut ids = store.list_sessions().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn cleanup_expired_removes_only_stale_sessions() {
        let store = InMemorySessionStore::new();
        store.get_session("fresh").await.unwrap();
        let mut stale = Session::new("stale".into());
        stale.last_active_at = SystemTime::now() - Duration::from_secs(3600);
        store.save_session(&stale).await.unwrap();

        let removed = store.cleanup_expired(Duration::from_secs(60)).await.unwrap();
        assert_eq!(removed, 1);
        let remaining = store.list_sessions().await.unwrap();
        assert_eq!(remaining, vec!["fresh".to_string()]);
    }
}
