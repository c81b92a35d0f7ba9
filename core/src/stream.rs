//! Streaming events emitted while a compiled graph runs.
//!
//! A caller opts into one or more `StreamMode`s; the executor only pays the
//! cost of building an event (cloning state, serializing) for modes that are
//! actually enabled.

use std::collections::HashSet;
use std::fmt::Debug;
use std::time::SystemTime;

use tokio::sync::mpsc;

/// Which categories of event a stream subscriber wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Full state snapshot after every super-step.
    Values,
    /// Just the channels a super-step wrote.
    Updates,
    /// Assistant message chunks as nodes produce them.
    Messages,
    /// Arbitrary node-emitted progress payloads.
    Custom,
    /// Node start/end task events.
    Tasks,
    /// Checkpoint-saved events.
    Checkpoints,
    /// Enables everything above.
    Debug,
}

#[derive(Debug, Clone)]
pub struct CheckpointEvent<S> {
    pub checkpoint_id: String,
    pub thread_id: String,
    pub step: u32,
    pub state: S,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone)]
pub enum StreamEvent<S> {
    Values(S),
    Updates { node_id: String, channels: serde_json::Value },
    TaskStart { node_id: String },
    TaskEnd { node_id: String, error: Option<String> },
    Checkpoint(CheckpointEvent<S>),
    Custom(serde_json::Value),
    Message { node_id: String, content: String },
}

/// Convenience wrapper around a stream sender and the modes enabled for it;
/// emit calls silently no-op when the sender is absent or the mode isn't enabled.
#[derive(Clone)]
pub struct StreamWriter<S> {
    tx: Option<mpsc::Sender<StreamEvent<S>>>,
    modes: HashSet<StreamMode>,
}

impl<S> StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(tx: Option<mpsc::Sender<StreamEvent<S>>>, modes: HashSet<StreamMode>) -> Self {
        Self { tx, modes }
    }

    fn enabled(&self, mode: StreamMode) -> bool {
        self.modes.contains(&mode) || self.modes.contains(&StreamMode::Debug)
    }

    pub async fn emit_custom(&self, value: serde_json::Value) -> bool {
        if !self.enabled(StreamMode::Custom) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(StreamEvent::Custom(value)).await.is_ok(),
            None => false,
        }
    }

    pub async fn emit_message(&self, content: impl Into<String>, node_id: impl Into<String>) -> bool {
        if !self.enabled(StreamMode::Messages) {
            return false;
        }
        match &self.tx {
            Some(tx) => tx
                .send(StreamEvent::Message { node_id: node_id.into(), content: content.into() })
                .await
                .is_ok(),
            None => false,
        }
    }
}
