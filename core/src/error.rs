//! Error taxonomy for the agent runtime: step loop, graph nodes, tools, LLM calls.

use thiserror::Error;

use crate::graph::GraphInterrupt;

/// Runtime error. Covers the step loop, the graph executor, tool calls and LLM calls.
///
/// `MaxStepsExceeded` is deliberately absent: running out of steps is a normal
/// stop condition surfaced through `AgentState::status`, not a failure.
#[derive(Debug, Error, Clone)]
pub enum AgentError {
    /// Catch-all execution failure with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A node requested an interrupt for human-in-the-loop approval.
    ///
    /// The executor catches this, saves a checkpoint, and can later resume
    /// execution with the supplied input.
    #[error("graph interrupted: {0}")]
    Interrupted(GraphInterrupt),

    /// LLM call failed in a way a retry may fix (timeout, rate limit, 5xx).
    #[error("transient LLM error: {0}")]
    TransientLlm(String),

    /// LLM call failed in a way retrying will not fix (bad request, auth, content filter).
    #[error("LLM error: {0}")]
    LlmFailed(String),

    /// Tool execution raised an error.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution { name: String, message: String },

    /// A tool call referenced a name not registered in the `ToolRegistry`.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Two writers targeted the same channel in one super-step with no reducer registered.
    #[error("channel conflict on '{channel}': concurrent writes with no reducer")]
    ChannelConflict { channel: String },

    /// Graph failed compile-time validation (missing node, unreachable edge, cycle without a reducer).
    #[error("graph validation failed: {0}")]
    GraphValidation(String),

    /// A run failed outright (not a step failure — the run as a whole could not complete).
    #[error("run failed: {0}")]
    RunFailed(String),

    /// The run was cancelled before completion.
    #[error("run cancelled")]
    Cancelled,
}

impl From<GraphInterrupt> for AgentError {
    fn from(interrupt: GraphInterrupt) -> Self {
        AgentError::Interrupted(interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_error_display_execution_failed() {
        let err = AgentError::ExecutionFailed("msg".to_string());
        let s = err.to_string();
        assert!(s.contains("execution failed"));
        assert!(s.contains("msg"));
    }

    #[test]
    fn tool_execution_names_tool_and_message() {
        let err = AgentError::ToolExecution {
            name: "search".into(),
            message: "timed out".into(),
        };
        assert_eq!(err.to_string(), "tool 'search' failed: timed out");
    }

    #[test]
    fn channel_conflict_names_channel() {
        let err = AgentError::ChannelConflict {
            channel: "messages".into(),
        };
        assert!(err.to_string().contains("messages"));
    }
}
