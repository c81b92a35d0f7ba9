//! Next-step result from a graph node: follow edges, jump to a node, or end.
//!
//! The graph runner uses this to decide the next frontier or to stop.

/// Next step after running a node.
///
/// - **Continue**: follow the node's conditional router if one is registered,
///   else every static edge out of this node (fan-out if there's more than one).
/// - **Node(id)**: jump directly to the given node, bypassing static edges.
/// - **End**: stop; this node's branch contributes no further successors.
///
/// **Interaction**: returned by `Node::run`; consumed by `CompiledStateGraph::successors`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Next {
    /// Follow the router (if any) or every static edge out of this node.
    Continue,
    /// Jump to the node with the given id next.
    Node(String),
    /// Contribute no successors from this node.
    End,
}
