//! Node trait: the unit of work in a `StateGraph`.
//!
//! A node takes ownership of a clone of the graph's state, returns a (possibly
//! modified) clone plus a `Next` routing decision. The executor diffs the
//! returned clone against the level's shared base state to find which fields
//! ("channels") the node wrote; it never mutates the caller's state directly.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::AgentError;

use super::{Next, RunContext};

/// Sentinel id for the implicit start of a graph.
pub const START: &str = "__start__";
/// Sentinel id for the implicit end of a graph.
pub const END: &str = "__end__";

#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn id(&self) -> &str;

    async fn run(&self, state: S) -> Result<(S, Next), AgentError>;

    /// Context-aware variant for nodes that stream progress or read managed
    /// values. Defaults to `run`, ignoring the context.
    async fn run_with_context(
        &self,
        state: S,
        _ctx: &RunContext<S>,
    ) -> Result<(S, Next), AgentError> {
        self.run(state).await
    }
}
