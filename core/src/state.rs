//! Agent state and status machine (C4): conversation history, step/token
//! counters, and whatever is needed to pause and resume a run.

use serde::{Deserialize, Serialize};

use crate::llm::LlmUsage;
use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Running,
    WaitingInput,
    Completed,
    Error,
}

/// Full state of one agent run: conversation so far, step counters, token totals,
/// and whatever is needed to resume a suspended run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub messages: Vec<Message>,
    pub current_step: u32,
    pub max_steps: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Set when `status == WaitingInput`; the tool call a human must approve or answer.
    pub paused_tool_call_id: Option<String>,
    /// The question or approval payload presented to the human, if any.
    pub pending_user_input: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl AgentState {
    pub fn new(max_steps: u32) -> Self {
        Self {
            status: AgentStatus::Idle,
            messages: Vec::new(),
            current_step: 0,
            max_steps,
            input_tokens: 0,
            output_tokens: 0,
            paused_tool_call_id: None,
            pending_user_input: None,
            error_message: None,
        }
    }

    /// Builds a fresh state using `default_max_steps` from a resolved runtime config,
    /// so a caller wiring up a run doesn't have to read the env var itself.
    pub fn from_runtime_config(config: &agent_config::RuntimeConfig) -> Self {
        Self::new(config.default_max_steps)
    }

    /// Resets step/token counters and clears any prior error for a fresh run over
    /// the same message history (used by Ralph between iterations).
    pub fn reset_for_run(&mut self) {
        self.status = AgentStatus::Idle;
        self.current_step = 0;
        self.input_tokens = 0;
        self.output_tokens = 0;
        self.paused_tool_call_id = None;
        self.pending_user_input = None;
        self.error_message = None;
    }

    pub fn increment_step(&mut self) {
        self.current_step += 1;
    }

    pub fn add_tokens(&mut self, usage: LlmUsage) {
        self.input_tokens += usage.prompt_tokens;
        self.output_tokens += usage.completion_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn mark_running(&mut self) {
        self.status = AgentStatus::Running;
    }

    pub fn mark_waiting_input(&mut self, tool_call_id: impl Into<String>, prompt: serde_json::Value) {
        self.status = AgentStatus::WaitingInput;
        self.paused_tool_call_id = Some(tool_call_id.into());
        self.pending_user_input = Some(prompt);
    }

    pub fn mark_completed(&mut self) {
        self.status = AgentStatus::Completed;
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = AgentStatus::Error;
        self.error_message = Some(message.into());
    }

    /// Transitions `WaitingInput` back to `Running` with the human-supplied answer
    /// to the paused tool call, clearing the paused call marker. The answer itself
    /// isn't stored on `AgentState` — the step loop consumes it immediately to
    /// retry the parked call.
    pub fn resume_from_input(&mut self, _answer: serde_json::Value) {
        self.status = AgentStatus::Running;
        self.paused_tool_call_id = None;
        self.pending_user_input = None;
    }

    /// Explicit resume from a terminal state (`Completed` or `Error`) back to `Running`,
    /// as required before a Ralph iteration or a manually re-triggered run can proceed.
    pub fn resume_from_checkpoint(&mut self) {
        self.status = AgentStatus::Running;
        self.error_message = None;
    }

    pub fn is_running(&self) -> bool {
        self.status == AgentStatus::Running
    }

    pub fn is_waiting_input(&self) -> bool {
        self.status == AgentStatus::WaitingInput
    }

    pub fn is_completed(&self) -> bool {
        self.status == AgentStatus::Completed
    }

    pub fn is_error(&self) -> bool {
        self.status == AgentStatus::Error
    }

    /// `status == Running && current_step < max_steps` — the step loop's continue condition.
    pub fn can_continue(&self) -> bool {
        self.is_running() && self.current_step < self.max_steps
    }
}
