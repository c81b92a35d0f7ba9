//! Node middleware: wraps every node invocation in a compiled graph.
//!
//! Used for cross-cutting concerns (logging, tracing spans, metrics) without
//! every node implementing them itself. See [`LoggingNodeMiddleware`](super::logging_middleware::LoggingNodeMiddleware).

use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::AgentError;

use super::Next;

type NodeFuture<S> = Pin<Box<dyn std::future::Future<Output = Result<(S, Next), AgentError>> + Send>>;

#[async_trait]
pub trait NodeMiddleware<S>: Send + Sync
where
    S: Clone + Send + Sync + Debug + 'static,
{
    async fn around_run(
        &self,
        node_id: &str,
        state: S,
        inner: Box<dyn FnOnce(S) -> NodeFuture<S> + Send>,
    ) -> Result<(S, Next), AgentError>;
}
