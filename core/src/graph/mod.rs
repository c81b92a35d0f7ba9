//! StateGraph executor (C7): level-synchronous BFS over an active frontier of
//! nodes, with per-channel reducers resolving concurrent writes.
//!
//! A single-node frontier at every level behaves exactly like a linear chain;
//! multi-node frontiers (parallel branches) and conditional routing build on
//! top of that without changing single-node semantics.

mod compiled;
mod conditional;
mod interrupt;
mod logging;
mod logging_middleware;
mod next;
mod node;
mod node_middleware;
mod retry;
mod run_context;
mod state_graph;
mod visualization;

pub use compiled::CompiledStateGraph;
pub use conditional::{ConditionalRouter, ConditionalRouterFn};
pub use interrupt::{DefaultInterruptHandler, GraphInterrupt, Interrupt, InterruptHandler};
pub use logging_middleware::LoggingNodeMiddleware;
pub use next::Next;
pub use node::{Node, END, START};
pub use node_middleware::NodeMiddleware;
pub use retry::RetryPolicy;
pub use run_context::RunContext;
pub use state_graph::StateGraph;
pub use visualization::{generate_dot, generate_text};

/// Per-invocation configuration: which persisted thread this run belongs to,
/// which checkpoint to resume from, and caller-supplied identity.
#[derive(Debug, Clone, Default)]
pub struct RunnableConfig {
    pub thread_id: Option<String>,
    pub checkpoint_id: Option<String>,
    pub checkpoint_ns: Option<String>,
    pub user_id: Option<String>,
    pub resume_from_node_id: Option<String>,
}

impl RunnableConfig {
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}
