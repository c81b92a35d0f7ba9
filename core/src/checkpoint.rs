//! Checkpoint contract for `AgentState` (part of C4): snapshot and restore a run
//! mid-flight, so a suspended or crashed run can resume from where it left off.
//!
//! A single snapshot-per-thread model: one checkpoint is taken before a
//! suspension point and consumed on resume. History/time-travel across
//! checkpoints is not part of the abstract contract this runtime exposes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::state::AgentState;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("thread_id is required to checkpoint")]
    ThreadIdRequired,
    #[error("storage error: {0}")]
    Storage(String),
}

/// A saved snapshot of an `AgentState` for one thread.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: AgentState,
    pub created_at: SystemTime,
}

/// Pluggable persistence for `AgentState` snapshots, keyed by thread id.
///
/// Concrete backends (file, Redis-like KV, Postgres-like relational) are not
/// part of this crate — only the contract and an in-memory reference
/// implementation used by tests and examples.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError>;

    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError>;

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError>;
}

/// In-memory `Checkpointer`: last-write-wins per thread, not persisted across process restarts.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    by_thread: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<(), CheckpointError> {
        if thread_id.is_empty() {
            return Err(CheckpointError::ThreadIdRequired);
        }
        self.by_thread.write().await.insert(
            thread_id.to_string(),
            Checkpoint {
                thread_id: thread_id.to_string(),
                state: state.clone(),
                created_at: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError> {
        Ok(self
            .by_thread
            .read()
            .await
            .get(thread_id)
            .map(|cp| cp.state.clone()))
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError> {
        self.by_thread.write().await.remove(thread_id);
        Ok(())
    }
}

/// Type-erased handle used where a checkpointer is optional (most callers).
pub type SharedCheckpointer = Arc<dyn Checkpointer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips_state() {
        let cp = InMemoryCheckpointer::new();
        let mut state = AgentState::new(10);
        state.mark_running();
        state.increment_step();
        cp.save("thread-1", &state).await.unwrap();

        let loaded = cp.load("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, 1);
        assert!(loaded.is_running());
    }

    #[tokio::test]
    async fn load_unknown_thread_returns_none() {
        let cp = InMemoryCheckpointer::new();
        assert!(cp.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_rejects_empty_thread_id() {
        let cp = InMemoryCheckpointer::new();
        let state = AgentState::new(10);
        let err = cp.save("", &state).await.unwrap_err();
        assert!(matches!(err, CheckpointError::ThreadIdRequired));
    }

    #[tokio::test]
    async fn delete_removes_checkpoint() {
        let cp = InMemoryCheckpointer::new();
        let state = AgentState::new(10);
        cp.save("t1", &state).await.unwrap();
        cp.delete("t1").await.unwrap();
        assert!(cp.load("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_again_overwrites_previous_snapshot() {
        let cp = InMemoryCheckpointer::new();
        let mut state = AgentState::new(10);
        cp.save("t1", &state).await.unwrap();
        state.increment_step();
        cp.save("t1", &state).await.unwrap();
        let loaded = cp.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, 1);
    }
}
