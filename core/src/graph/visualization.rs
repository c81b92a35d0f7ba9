//! Graph visualization utilities.
//!
//! Exports a compiled graph's node/edge structure to Graphviz DOT format, or a
//! plain-text adjacency listing, for debugging a graph that may fan out and
//! join rather than form a single chain.

use std::fmt::Write;

use super::CompiledStateGraph;
use super::{END, START};

/// Generates a Graphviz DOT representation of the graph's static structure.
///
/// Conditional edges are not resolved (they depend on runtime state), so
/// nodes with a registered router are rendered pointing at `"?"`.
pub fn generate_dot<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: std::fmt::Debug,
{
    let mut dot = String::from("digraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box];\n\n");

    dot.push_str(&format!(
        "  \"{}\" [label=\"START\", style=bold, fillcolor=lightgreen];\n",
        START
    ));
    dot.push_str(&format!(
        "  \"{}\" [label=\"END\", style=bold, fillcolor=lightcoral];\n",
        END
    ));

    for node_id in graph.nodes.keys() {
        dot.push_str(&format!("  \"{}\";\n", node_id));
    }
    dot.push('\n');

    for first in &graph.first_nodes {
        dot.push_str(&format!("  \"{}\" -> \"{}\";\n", START, first));
    }

    for (from, targets) in &graph.edges {
        for to in targets {
            dot.push_str(&format!("  \"{}\" -> \"{}\";\n", from, to));
        }
    }

    for from in graph.conditional_routers.keys() {
        dot.push_str(&format!("  \"{}\" -> \"?\" [style=dashed];\n", from));
    }

    dot.push_str("}\n");
    dot
}

/// Generates a plain-text adjacency listing of the graph.
pub fn generate_text<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: std::fmt::Debug,
{
    let mut text = String::new();
    writeln!(text, "Graph Structure:").unwrap();
    writeln!(text, "Nodes: {}", graph.nodes.len()).unwrap();

    writeln!(text, "\nEntry points:").unwrap();
    for first in &graph.first_nodes {
        writeln!(text, "  {} -> {}", START, first).unwrap();
    }

    writeln!(text, "\nEdges:").unwrap();
    for (from, targets) in &graph.edges {
        for to in targets {
            writeln!(text, "  {} -> {}", from, to).unwrap();
        }
    }

    writeln!(text, "\nConditional routers:").unwrap();
    for from in graph.conditional_routers.keys() {
        writeln!(text, "  {} -> ?", from).unwrap();
    }
    let _ = END;

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::graph::{Next, Node, StateGraph};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct PassThrough {
        id: String,
    }

    #[async_trait]
    impl Node<String> for PassThrough {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, state: String) -> Result<(String, Next), AgentError> {
            Ok((state, Next::Continue))
        }
    }

    #[test]
    fn generate_dot_includes_entry_and_edges() {
        let mut graph = StateGraph::<String>::new();
        graph.add_node(
            "node1",
            Arc::new(PassThrough {
                id: "node1".to_string(),
            }),
        );
        graph.add_node(
            "node2",
            Arc::new(PassThrough {
                id: "node2".to_string(),
            }),
        );
        graph.add_edge(START, "node1");
        graph.add_edge("node1", "node2");

        let compiled = graph.compile().unwrap();
        let dot = generate_dot(&compiled);

        assert!(dot.contains("digraph"));
        assert!(dot.contains("START"));
        assert!(dot.contains("END"));
        assert!(dot.contains("\"__start__\" -> \"node1\""));
        assert!(dot.contains("\"node1\" -> \"node2\""));
    }

    #[test]
    fn generate_text_lists_entry_points_and_edges() {
        let mut graph = StateGraph::<String>::new();
        graph.add_node(
            "node1",
            Arc::new(PassThrough {
                id: "node1".to_string(),
            }),
        );
        graph.add_edge(START, "node1");

        let compiled = graph.compile().unwrap();
        let text = generate_text(&compiled);

        assert!(text.contains("Graph Structure"));
        assert!(text.contains("node1"));
        assert!(text.contains(START));
    }
}
