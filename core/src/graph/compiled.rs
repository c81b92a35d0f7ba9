//! Compiled state graph: immutable, supports invoke/stream only.
//!
//! Built by `StateGraph::compile()`. Runs a level-synchronous BFS over an
//! "active frontier" of node ids: every node in the current frontier runs
//! concurrently against the same base state, their writes are diffed out
//! per top-level JSON field ("channel") and merged back via the graph's
//! `ChannelRegistry`, and the union of their successors becomes the next
//! frontier. A frontier that never exceeds one node reduces to exactly a
//! single-pointer linear chain; parallel branches and fan-out/fan-in are the
//! generalization layered on top of that walk.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::channels::ChannelRegistry;
use crate::error::AgentError;

use super::conditional::ConditionalRouter;
use super::interrupt::InterruptHandler;
use super::logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
    log_node_state,
};
use super::node::{Node, END};
use super::node_middleware::NodeMiddleware;
use super::retry::RetryPolicy;
use super::run_context::RunContext;
use super::{Next, RunnableConfig};
use crate::stream::{StreamEvent, StreamMode};

#[derive(Clone)]
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) first_nodes: Vec<String>,
    pub(super) edges: HashMap<String, Vec<String>>,
    pub(super) conditional_routers: HashMap<String, ConditionalRouter<S>>,
    pub(super) channels: ChannelRegistry,
    pub(super) middleware: Option<Arc<dyn NodeMiddleware<S>>>,
    pub(super) retry_policy: RetryPolicy,
    pub(super) interrupt_handler: Option<Arc<dyn InterruptHandler>>,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + Serialize + DeserializeOwned + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        nodes: HashMap<String, Arc<dyn Node<S>>>,
        first_nodes: Vec<String>,
        edges: HashMap<String, Vec<String>>,
        conditional_routers: HashMap<String, ConditionalRouter<S>>,
        channels: ChannelRegistry,
        middleware: Option<Arc<dyn NodeMiddleware<S>>>,
        retry_policy: RetryPolicy,
        interrupt_handler: Option<Arc<dyn InterruptHandler>>,
    ) -> Self {
        Self {
            nodes,
            first_nodes,
            edges,
            conditional_routers,
            channels,
            middleware,
            retry_policy,
            interrupt_handler,
        }
    }

    async fn execute_node(
        &self,
        node: Arc<dyn Node<S>>,
        state: S,
        run_ctx: Option<&RunContext<S>>,
    ) -> Result<(S, Next), AgentError> {
        let mut attempt = 0;
        loop {
            let current_state = state.clone();
            let result = if let Some(middleware) = &self.middleware {
                let node_id = node.id().to_string();
                let run_ctx_owned = run_ctx.cloned();
                let node_clone = node.clone();
                middleware
                    .around_run(
                        &node_id,
                        current_state,
                        Box::new(move |s| {
                            let node = node_clone.clone();
                            let run_ctx_inner = run_ctx_owned.clone();
                            Box::pin(async move {
                                if let Some(ctx) = run_ctx_inner.as_ref() {
                                    node.run_with_context(s, ctx).await
                                } else {
                                    node.run(s).await
                                }
                            })
                        }),
                    )
                    .await
            } else if let Some(ctx) = run_ctx {
                node.run_with_context(current_state, ctx).await
            } else {
                node.run(current_state).await
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) => {
                    if self.retry_policy.should_retry(attempt) {
                        let delay = self.retry_policy.delay(attempt);
                        if delay > std::time::Duration::ZERO {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Resolves the ids a node's level should activate next, given the `Next`
    /// it returned and its own proposed state (conditional routers see the
    /// node's own write, not yet the merged base).
    fn successors(&self, node_id: &str, next: &Next, proposal: &S) -> Vec<String> {
        match next {
            Next::End => vec![],
            Next::Node(id) => vec![id.clone()],
            Next::Continue => {
                if let Some(router) = self.conditional_routers.get(node_id) {
                    vec![router.resolve_next(proposal)]
                } else {
                    self.edges.get(node_id).cloned().unwrap_or_default()
                }
            }
        }
    }

    async fn run_frontier(
        &self,
        mut base: S,
        mut frontier: Vec<String>,
        run_ctx: Option<&RunContext<S>>,
    ) -> Result<S, AgentError> {
        log_graph_start();

        loop {
            let mut seen = HashSet::new();
            frontier.retain(|id| seen.insert(id.clone()));
            let runnable: Vec<String> = frontier.iter().filter(|id| id.as_str() != END).cloned().collect();

            if runnable.is_empty() {
                break;
            }

            let base_value = serde_json::to_value(&base)
                .map_err(|e| AgentError::ExecutionFailed(format!("state not serializable: {e}")))?;

            for node_id in &runnable {
                log_node_start(node_id);
                log_node_state(node_id, &base);
            }

            let futures = runnable.iter().map(|node_id| {
                let node = self
                    .nodes
                    .get(node_id)
                    .cloned()
                    .expect("edge referenced a node absent at compile time");
                self.execute_node(node, base.clone(), run_ctx)
            });
            let results = join_all(futures).await;

            let mut writes: HashMap<String, Vec<Value>> = HashMap::new();
            let mut next_frontier = Vec::new();

            for (node_id, result) in runnable.iter().zip(results.into_iter()) {
                match result {
                    Ok((proposal, next)) => {
                        log_node_complete(node_id, &next);
                        let proposal_value = serde_json::to_value(&proposal).map_err(|e| {
                            AgentError::ExecutionFailed(format!("state not serializable: {e}"))
                        })?;
                        if let (Value::Object(base_obj), Value::Object(prop_obj)) =
                            (&base_value, &proposal_value)
                        {
                            for (key, value) in prop_obj {
                                if base_obj.get(key) != Some(value) {
                                    writes.entry(key.clone()).or_default().push(value.clone());
                                }
                            }
                        }
                        next_frontier.extend(self.successors(node_id, &next, &proposal));
                    }
                    Err(err) => {
                        log_graph_error(&err);
                        if let AgentError::Interrupted(ref graph_interrupt) = err {
                            if let Some(handler) = &self.interrupt_handler {
                                handler.handle_interrupt(&graph_interrupt.0)?;
                            }
                        }
                        return Err(err);
                    }
                }
            }

            let merged = self
                .channels
                .merge(&base_value, &writes)
                .map_err(|channel| AgentError::ChannelConflict { channel })?;
            base = serde_json::from_value(merged)
                .map_err(|e| AgentError::ExecutionFailed(format!("merged state invalid: {e}")))?;

            if let Some(ctx) = run_ctx {
                if ctx.is_streaming_mode(StreamMode::Values) {
                    if let Some(tx) = &ctx.stream_tx {
                        let _ = tx.send(StreamEvent::Values(base.clone())).await;
                    }
                }
                if ctx.is_streaming_mode(StreamMode::Updates) {
                    if let Some(tx) = &ctx.stream_tx {
                        for node_id in &runnable {
                            let _ = tx
                                .send(StreamEvent::Updates {
                                    node_id: node_id.clone(),
                                    channels: serde_json::json!(writes.keys().collect::<Vec<_>>()),
                                })
                                .await;
                        }
                    }
                }
            }

            frontier = next_frontier;
        }

        log_graph_complete();
        Ok(base)
    }

    pub async fn invoke(&self, state: S, _config: Option<RunnableConfig>) -> Result<S, AgentError> {
        self.run_frontier(state, self.first_nodes.clone(), None).await
    }

    pub async fn invoke_with_context(
        &self,
        state: S,
        ctx: RunContext<S>,
    ) -> Result<S, AgentError> {
        self.run_frontier(state, self.first_nodes.clone(), Some(&ctx)).await
    }

    /// Runs the graph in the background, emitting `StreamEvent`s for the
    /// requested `modes` on the returned stream as the run progresses.
    pub fn stream(&self, state: S, modes: HashSet<StreamMode>) -> ReceiverStream<StreamEvent<S>>
    where
        S: 'static,
    {
        let (tx, rx) = mpsc::channel(32);
        let graph = self.clone();
        tokio::spawn(async move {
            let mut ctx = RunContext::new(RunnableConfig::default());
            ctx.stream_tx = Some(tx);
            ctx.stream_mode = modes;
            let first_nodes = graph.first_nodes.clone();
            let _ = graph.run_frontier(state, first_nodes, Some(&ctx)).await;
        });
        ReceiverStream::new(rx)
    }
}
