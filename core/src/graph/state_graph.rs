//! Builder for a `CompiledStateGraph`.
//!
//! `add_node`/`add_edge`/`add_conditional_edges` assemble the graph; optional
//! extras (`with_node_logging`, `with_interrupt_handler`, `with_retry_policy`)
//! are builder setters rather than one `compile_with_*` overload per
//! combination. `add_edge` accepts being called more than once from the same
//! source node, which fans out to a parallel frontier instead of requiring a
//! single successor.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::channels::ChannelRegistry;
use crate::error::AgentError;

use super::conditional::{ConditionalRouter, ConditionalRouterFn};
use super::interrupt::InterruptHandler;
use super::logging_middleware::LoggingNodeMiddleware;
use super::node::{Node, END, START};
use super::node_middleware::NodeMiddleware;
use super::retry::RetryPolicy;
use super::CompiledStateGraph;

pub struct StateGraph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Vec<String>>,
    conditional_routers: HashMap<String, ConditionalRouter<S>>,
    first_nodes: Vec<String>,
    channels: ChannelRegistry,
    retry_policy: RetryPolicy,
    interrupt_handler: Option<Arc<dyn InterruptHandler>>,
    with_logging: bool,
}

impl<S> Default for StateGraph<S> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            conditional_routers: HashMap::new(),
            first_nodes: Vec::new(),
            channels: ChannelRegistry::new(),
            retry_policy: RetryPolicy::None,
            interrupt_handler: None,
            with_logging: false,
        }
    }
}

impl<S> StateGraph<S>
where
    S: Clone + Send + Sync + Debug + serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<String>, node: Arc<dyn Node<S>>) -> &mut Self {
        self.nodes.insert(id.into(), node);
        self
    }

    /// Adds an edge. `from == START` seeds the initial frontier; repeated calls
    /// from the same `from` fan out to a parallel frontier at that level.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let from = from.into();
        let to = to.into();
        if from == START {
            self.first_nodes.push(to);
        } else {
            self.edges.entry(from).or_default().push(to);
        }
        self
    }

    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        path: ConditionalRouterFn<S>,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self {
        self.conditional_routers
            .insert(from.into(), ConditionalRouter::new(path, path_map));
        self
    }

    /// Registers a reducer for a named channel (a top-level field of `S`), used
    /// to merge concurrent writes from a parallel frontier.
    pub fn add_channel_reducer(
        &mut self,
        channel: impl Into<String>,
        reducer: Arc<dyn crate::channels::Reducer>,
    ) -> &mut Self {
        self.channels.register(channel, reducer);
        self
    }

    pub fn with_retry_policy(&mut self, policy: RetryPolicy) -> &mut Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_interrupt_handler(&mut self, handler: Arc<dyn InterruptHandler>) -> &mut Self {
        self.interrupt_handler = Some(handler);
        self
    }

    pub fn with_node_logging(&mut self) -> &mut Self {
        self.with_logging = true;
        self
    }

    pub fn compile(&self) -> Result<CompiledStateGraph<S>, AgentError> {
        if self.first_nodes.is_empty() {
            return Err(AgentError::GraphValidation(
                "graph has no edge from START".into(),
            ));
        }
        for id in self.first_nodes.iter().chain(self.edges.values().flatten()) {
            if id != END && !self.nodes.contains_key(id) {
                return Err(AgentError::GraphValidation(format!(
                    "edge references unknown node '{id}'"
                )));
            }
        }

        if self.edges.contains_key(END) {
            return Err(AgentError::GraphValidation(
                "END cannot have an outgoing edge".into(),
            ));
        }

        let mut referenced: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for target in self.first_nodes.iter().chain(self.edges.values().flatten()) {
            referenced.insert(target.as_str());
        }
        for source in self.edges.keys().chain(self.conditional_routers.keys()) {
            referenced.insert(source.as_str());
        }
        for router in self.conditional_routers.values() {
            if let Some(path_map) = &router.path_map {
                referenced.extend(path_map.values().map(String::as_str));
            }
        }
        for id in self.nodes.keys() {
            if !referenced.contains(id.as_str()) {
                return Err(AgentError::GraphValidation(format!(
                    "node '{id}' is never reached by an edge or router"
                )));
            }
        }

        let middleware: Option<Arc<dyn NodeMiddleware<S>>> = if self.with_logging {
            Some(Arc::new(LoggingNodeMiddleware::default()))
        } else {
            None
        };

        Ok(CompiledStateGraph::new(
            self.nodes.clone(),
            self.first_nodes.clone(),
            self.edges.clone(),
            self.conditional_routers.clone(),
            self.channels.clone(),
            middleware,
            self.retry_policy.clone(),
            self.interrupt_handler.clone(),
        ))
    }
}
