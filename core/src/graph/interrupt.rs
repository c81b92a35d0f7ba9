//! A node-raised pause for human-in-the-loop approval, distinct from `AgentState`'s
//! own `WAITING_INPUT` (which pauses the step loop's tool-call dispatch rather
//! than a graph node).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AgentError;

/// The payload a node hands back when it can't proceed without approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
    pub value: serde_json::Value,
    pub id: Option<String>,
}

impl Interrupt {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value, id: None }
    }

    pub fn with_id(value: serde_json::Value, id: String) -> Self {
        Self {
            value,
            id: Some(id),
        }
    }
}

/// Wraps an `Interrupt` as the error variant the executor's frontier loop
/// catches to stop the run and hand control back to `InterruptHandler`.
#[derive(Debug, Clone, Error)]
#[error("Graph interrupted: {0:?}")]
pub struct GraphInterrupt(pub Interrupt);

impl From<Interrupt> for GraphInterrupt {
    fn from(interrupt: Interrupt) -> Self {
        GraphInterrupt(interrupt)
    }
}

/// Runs when a node's result carries an interrupt, before the executor
/// propagates the error out of `run`. Installed via `StateGraph::with_interrupt_handler`.
pub trait InterruptHandler: Send + Sync {
    fn handle_interrupt(&self, interrupt: &Interrupt) -> Result<serde_json::Value, AgentError>;
}

/// Passes the interrupt value through unchanged — the default when no handler is installed.
#[derive(Debug, Clone)]
pub struct DefaultInterruptHandler;

impl InterruptHandler for DefaultInterruptHandler {
    fn handle_interrupt(&self, interrupt: &Interrupt) -> Result<serde_json::Value, AgentError> {
        Ok(interrupt.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_interrupt_has_no_id() {
        let interrupt = Interrupt::new(serde_json::json!({"action": "approve"}));
        assert_eq!(interrupt.value, serde_json::json!({"action": "approve"}));
        assert_eq!(interrupt.id, None);
    }

    #[test]
    fn with_id_carries_the_given_id() {
        let interrupt = Interrupt::with_id(
            serde_json::json!({"action": "approve"}),
            "interrupt_1".to_string(),
        );
        assert_eq!(interrupt.value, serde_json::json!({"action": "approve"}));
        assert_eq!(interrupt.id, Some("interrupt_1".to_string()));
    }

    #[test]
    fn graph_interrupt_wraps_the_interrupt_value() {
        let interrupt = Interrupt::new(serde_json::json!({"action": "approve"}));
        let graph_interrupt = GraphInterrupt::from(interrupt);
        assert_eq!(
            graph_interrupt.0.value,
            serde_json::json!({"action": "approve"})
        );
    }

    #[test]
    fn default_handler_passes_the_value_through() {
        let handler = DefaultInterruptHandler;
        let interrupt = Interrupt::new(serde_json::json!({"action": "approve"}));
        let result = handler.handle_interrupt(&interrupt).unwrap();
        assert_eq!(result, serde_json::json!({"action": "approve"}));
    }
}
