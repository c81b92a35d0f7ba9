//! Run context passed into nodes for streaming- and managed-value-aware execution.
//!
//! Holds the invocation's `RunnableConfig`, an optional stream sender, the
//! enabled stream modes, managed values, and (when resuming) the previous state.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::managed::ManagedValue;
use crate::stream::{StreamEvent, StreamMode, StreamWriter};

use super::RunnableConfig;

#[derive(Clone)]
pub struct RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub config: RunnableConfig,
    pub stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
    pub stream_mode: HashSet<StreamMode>,
    pub managed_values: HashMap<String, Arc<dyn ManagedValue<Value, S>>>,
    /// The previous state for this thread, available when resuming from a checkpoint.
    pub previous: Option<S>,
    /// Custom runtime context (user_id, delegation target, etc.) passed by the caller.
    pub runtime_context: Option<Value>,
}

impl<S> RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(config: RunnableConfig) -> Self {
        Self {
            config,
            stream_tx: None,
            stream_mode: HashSet::new(),
            managed_values: HashMap::new(),
            previous: None,
            runtime_context: None,
        }
    }

    pub fn get_managed_value(&self, name: &str) -> Option<Value> {
        self.managed_values.get(name).map(|mv| mv.get(self))
    }

    pub fn with_managed_value(
        mut self,
        name: impl Into<String>,
        value: Arc<dyn ManagedValue<Value, S>>,
    ) -> Self {
        self.managed_values.insert(name.into(), value);
        self
    }

    pub fn with_previous(mut self, previous: S) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn with_runtime_context(mut self, context: Value) -> Self {
        self.runtime_context = Some(context);
        self
    }

    pub fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    pub fn runtime_context(&self) -> Option<&Value> {
        self.runtime_context.as_ref()
    }

    pub fn stream_writer(&self) -> StreamWriter<S> {
        StreamWriter::new(self.stream_tx.clone(), self.stream_mode.clone())
    }

    pub async fn emit_custom(&self, value: Value) -> bool {
        self.stream_writer().emit_custom(value).await
    }

    pub async fn emit_message(&self, content: impl Into<String>, node_id: impl Into<String>) -> bool {
        self.stream_writer().emit_message(content, node_id).await
    }

    pub fn is_streaming_mode(&self, mode: StreamMode) -> bool {
        self.stream_mode.contains(&mode)
    }
}
