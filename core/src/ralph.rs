//! Ralph meta-loop (C6): repeatedly runs the step loop over working memory until
//! a completion condition fires or an iteration cap is hit.
//!
//! Each iteration gets a fresh step loop run seeded from accumulated working
//! memory, not a continuation of the previous run's message history — that's
//! what distinguishes Ralph from just raising `max_steps` on a single step loop.

use crate::error::AgentError;
use crate::event::{AgentEvent, EventBus, EventType};
use crate::llm::{LlmClient, ToolChoiceMode};
use crate::message::{Message, Role};
use crate::state::AgentState;
use crate::step_loop::{run_step_loop, StepLoopConfig};
use crate::tool::ToolRegistry;

/// One of the conditions `RalphConfig::completion_conditions` may combine.
/// Any condition firing ends the run; `MAX_ITERATIONS` always fires eventually
/// as a backstop even if the caller forgets to list it.
#[derive(Debug, Clone)]
pub enum CompletionCondition {
    /// Last assistant content contains `tag` → completed with reason `promise`.
    PromiseTag(String),
    /// `consecutive_idle >= threshold` consecutive no-progress iterations →
    /// completed with reason `idle`.
    IdleThreshold(u32),
    /// `iteration >= max_iterations` → completed with reason `max_iterations`.
    MaxIterations,
}

/// Reason a Ralph run stopped, carried on `RalphOutcome` and the
/// `ralph_completion` event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    Promise,
    Idle,
    MaxIterations,
}

impl CompletionReason {
    fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::Promise => "promise",
            CompletionReason::Idle => "idle",
            CompletionReason::MaxIterations => "max_iterations",
        }
    }
}

/// How much of the accumulated history carries into the next iteration's prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStrategy {
    /// Pass every prior iteration's final assistant content.
    All,
    /// Pass only the last `n` iterations.
    Recent(usize),
    /// Fold older iterations into a running summary (via a dedicated LLM call)
    /// once the carried-forward content exceeds `summarize_token_threshold`.
    Summarize,
}

#[derive(Debug, Clone)]
pub struct RalphConfig {
    pub max_iterations: u32,
    pub completion_conditions: Vec<CompletionCondition>,
    pub context_strategy: ContextStrategy,
    /// Only consulted when `context_strategy == Summarize`; an approximate
    /// token count (chars / 4) above which older entries get folded.
    pub summarize_token_threshold: usize,
    pub step_loop: StepLoopConfig,
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            completion_conditions: vec![CompletionCondition::IdleThreshold(1), CompletionCondition::MaxIterations],
            context_strategy: ContextStrategy::All,
            summarize_token_threshold: 30_000,
            step_loop: StepLoopConfig::default(),
        }
    }
}

/// Accumulates notes across iterations, independent of any single step loop's
/// `AgentState::messages` (which is reset every iteration). Derived from each
/// iteration's messages — never a substitute for them.
#[derive(Debug, Clone, Default)]
pub struct RalphWorkingMemory {
    pub files_modified: Vec<String>,
    pub pending_todos: Vec<String>,
    pub completed_todos: Vec<String>,
    /// Folded summary of iterations older than the current `Recent`/`Summarize`
    /// window. Empty until a fold actually happens.
    pub summary: String,
    /// One entry per iteration that made progress: its final assistant reply.
    pub progress_log: Vec<String>,
}

impl RalphWorkingMemory {
    /// Scans one iteration's messages for file writes/edits, `<promise>` tags
    /// being irrelevant here (handled by `CompletionCondition::PromiseTag`
    /// against the reply directly), and TODO-like progress lines. Returns
    /// whether this iteration counts as having made progress: a non-empty
    /// delta in modified file paths, or a new/completed TODO.
    pub fn record_iteration(&mut self, messages: &[Message]) -> bool {
        let mut call_names = std::collections::HashMap::new();
        for m in messages {
            if let Some(calls) = &m.tool_calls {
                for c in calls {
                    call_names.insert(c.id.clone(), (c.name.clone(), c.arguments.clone()));
                }
            }
        }

        let mut progressed = false;

        for m in messages {
            if m.role != Role::Tool {
                continue;
            }
            let Some(call_id) = &m.tool_call_id else { continue };
            let Some((name, arguments)) = call_names.get(call_id) else { continue };
            if !(name.contains("write") || name.contains("edit")) {
                continue;
            }
            if let Some(path) = extract_path(arguments) {
                if !self.files_modified.contains(&path) {
                    self.files_modified.push(path);
                    progressed = true;
                }
            }
        }

        for m in messages {
            if m.role != Role::Assistant {
                continue;
            }
            for line in m.content.lines() {
                let trimmed = line.trim();
                if let Some(todo) = trimmed.strip_prefix("TODO:") {
                    let todo = todo.trim().to_string();
                    if !self.pending_todos.contains(&todo) {
                        self.pending_todos.push(todo);
                        progressed = true;
                    }
                } else if let Some(done) = trimmed.strip_prefix("DONE:") {
                    let done = done.trim().to_string();
                    if self.pending_todos.iter().any(|t| t == &done) || !self.completed_todos.contains(&done) {
                        self.pending_todos.retain(|t| t != &done);
                        self.completed_todos.push(done);
                        progressed = true;
                    }
                }
            }
        }

        if progressed {
            if let Some(reply) = messages.iter().rev().find(|m| m.role == Role::Assistant) {
                self.progress_log.push(reply.content.clone());
            }
        }

        progressed
    }

    /// Clears accumulated memory, keeping the runner reusable across unrelated
    /// tasks without rebuilding the config.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn extract_path(arguments_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(arguments_json).ok()?;
    value
        .get("path")
        .or_else(|| value.get("file_path"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub struct RalphOutcome {
    pub iterations_run: u32,
    pub reason: CompletionReason,
    pub memory: RalphWorkingMemory,
    pub final_state: AgentState,
}

/// Builds the next iteration's carried-forward context per `context_strategy`,
/// folding older entries into `memory.summary` via `llm` when the `Summarize`
/// strategy's token threshold is exceeded.
async fn build_context(
    memory: &mut RalphWorkingMemory,
    strategy: ContextStrategy,
    summarize_token_threshold: usize,
    llm: &dyn LlmClient,
) -> Result<String, AgentError> {
    match strategy {
        ContextStrategy::All => Ok(memory.progress_log.join("\n")),
        ContextStrategy::Recent(n) => {
            let recent: Vec<_> = memory.progress_log.iter().rev().take(n).rev().cloned().collect();
            Ok(recent.join("\n"))
        }
        ContextStrategy::Summarize => {
            let estimated_tokens: usize = memory.progress_log.iter().map(|s| s.len() / 4).sum();
            if estimated_tokens > summarize_token_threshold {
                let folded = std::mem::take(&mut memory.progress_log);
                let prompt = format!(
                    "Summarize this agent's progress so far into a concise running summary.\n\nPrior summary:\n{}\n\nNew progress entries:\n{}",
                    memory.summary,
                    folded.join("\n"),
                );
                let response = llm.invoke(&[Message::user(prompt)], &[], ToolChoiceMode::None).await?;
                memory.summary = response.content;
            }
            if memory.summary.is_empty() {
                Ok(memory.progress_log.join("\n"))
            } else {
                Ok(format!("{}\n\n{}", memory.summary, memory.progress_log.join("\n")))
            }
        }
    }
}

fn seed_iteration(context: &str, task: &str) -> AgentState {
    let mut state = AgentState::new(u32::MAX);
    let prompt = if context.is_empty() {
        task.to_string()
    } else {
        format!("{context}\n\n{task}")
    };
    state.messages.push(Message::user(prompt));
    state
}

/// Runs one Ralph meta-loop, reusable across unrelated tasks via `reset`.
pub struct RalphRunner {
    pub config: RalphConfig,
    pub memory: RalphWorkingMemory,
    consecutive_idle: u32,
}

impl RalphRunner {
    pub fn new(config: RalphConfig) -> Self {
        Self { config, memory: RalphWorkingMemory::default(), consecutive_idle: 0 }
    }

    /// Clears working memory and the idle counter so this runner can start a
    /// fresh, unrelated task without being reconstructed.
    pub fn reset_ralph(&mut self) {
        self.memory.reset();
        self.consecutive_idle = 0;
    }

    /// Runs iterations until a `completion_conditions` entry fires.
    /// `MAX_ITERATIONS` always applies as a backstop even if not listed.
    pub async fn run(
        &mut self,
        task: &str,
        llm: &dyn LlmClient,
        tools: &ToolRegistry,
        events: Option<&EventBus>,
    ) -> Result<RalphOutcome, AgentError> {
        let mut last_state = AgentState::new(0);

        for iteration in 0..self.config.max_iterations {
            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::RalphIterationStart,
                    serde_json::json!({ "iteration": iteration, "max_iterations": self.config.max_iterations }),
                ))
                .await;
            }

            let context = build_context(
                &mut self.memory,
                self.config.context_strategy,
                self.config.summarize_token_threshold,
                llm,
            )
            .await?;
            let mut state = seed_iteration(&context, task);
            run_step_loop(&mut state, llm, tools, &self.config.step_loop, events).await?;

            let reply = state.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let progressed = self.memory.record_iteration(&state.messages);
            if progressed {
                self.consecutive_idle = 0;
            } else {
                self.consecutive_idle += 1;
            }

            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::RalphIterationEnd,
                    serde_json::json!({ "iteration": iteration, "reply": reply, "progressed": progressed }),
                ))
                .await;
            }

            last_state = state;

            let reason = self.config.completion_conditions.iter().find_map(|c| match c {
                CompletionCondition::PromiseTag(tag) if reply.contains(tag.as_str()) => {
                    Some(CompletionReason::Promise)
                }
                CompletionCondition::IdleThreshold(threshold) if self.consecutive_idle >= *threshold => {
                    Some(CompletionReason::Idle)
                }
                CompletionCondition::MaxIterations if iteration + 1 >= self.config.max_iterations => {
                    Some(CompletionReason::MaxIterations)
                }
                _ => None,
            });

            if let Some(reason) = reason {
                if let Some(bus) = events {
                    bus.emit(AgentEvent::new(
                        EventType::RalphCompletion,
                        serde_json::json!({ "iterations_run": iteration + 1, "reason": reason.as_str() }),
                    ))
                    .await;
                }
                return Ok(RalphOutcome {
                    iterations_run: iteration + 1,
                    reason,
                    memory: self.memory.clone(),
                    final_state: last_state,
                });
            }
        }

        if let Some(bus) = events {
            bus.emit(AgentEvent::new(
                EventType::RalphCompletion,
                serde_json::json!({ "iterations_run": self.config.max_iterations, "reason": "max_iterations" }),
            ))
            .await;
        }
        Ok(RalphOutcome {
            iterations_run: self.config.max_iterations,
            reason: CompletionReason::MaxIterations,
            memory: self.memory.clone(),
            final_state: last_state,
        })
    }
}

/// Convenience entry point for a single, one-off Ralph run with no reuse.
pub async fn run_ralph(
    task: &str,
    llm: &dyn LlmClient,
    tools: &ToolRegistry,
    config: &RalphConfig,
    events: Option<&EventBus>,
) -> Result<RalphOutcome, AgentError> {
    let mut runner = RalphRunner::new(config.clone());
    runner.run(task, llm, tools, events).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, LlmUsage, MessageChunk, ToolChoiceMode};
    use crate::message::Message as Msg;
    use crate::tool::ToolSpec;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for CountingLlm {
        async fn invoke(
            &self,
            _messages: &[Msg],
            _tools: &[ToolSpec],
            _tool_choice: ToolChoiceMode,
        ) -> Result<LlmResponse, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LlmResponse {
                content: format!("TODO: step {n}"),
                tool_calls: vec![],
                usage: Some(LlmUsage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 }),
            })
        }

        async fn invoke_stream(
            &self,
            messages: &[Msg],
            tools: &[ToolSpec],
            tool_choice: ToolChoiceMode,
            _chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
        ) -> Result<LlmResponse, AgentError> {
            self.invoke(messages, tools, tool_choice).await
        }
    }

    struct ConstantLlm;

    #[async_trait]
    impl LlmClient for ConstantLlm {
        async fn invoke(
            &self,
            _messages: &[Msg],
            _tools: &[ToolSpec],
            _tool_choice: ToolChoiceMode,
        ) -> Result<LlmResponse, AgentError> {
            Ok(LlmResponse { content: "nothing left to do".into(), tool_calls: vec![], usage: None })
        }
        async fn invoke_stream(
            &self,
            messages: &[Msg],
            tools: &[ToolSpec],
            tool_choice: ToolChoiceMode,
            _chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
        ) -> Result<LlmResponse, AgentError> {
            self.invoke(messages, tools, tool_choice).await
        }
    }

    #[tokio::test]
    async fn idle_threshold_one_stops_after_first_no_progress_iteration() {
        let llm = ConstantLlm;
        let tools = ToolRegistry::new();
        let config = RalphConfig::default();
        let outcome = run_ralph("do the task", &llm, &tools, &config, None).await.unwrap();
        assert_eq!(outcome.iterations_run, 1);
        assert_eq!(outcome.reason, CompletionReason::Idle);
    }

    #[tokio::test]
    async fn idle_threshold_counts_consecutive_not_total() {
        struct FlakyLlm {
            calls: AtomicUsize,
        }
        #[async_trait]
        impl LlmClient for FlakyLlm {
            async fn invoke(
                &self,
                _messages: &[Msg],
                _tools: &[ToolSpec],
                _tool_choice: ToolChoiceMode,
            ) -> Result<LlmResponse, AgentError> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                let content = if n == 1 { "nothing happened".to_string() } else { format!("TODO: item {n}") };
                Ok(LlmResponse { content, tool_calls: vec![], usage: None })
            }
            async fn invoke_stream(
                &self,
                messages: &[Msg],
                tools: &[ToolSpec],
                tool_choice: ToolChoiceMode,
                _chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
            ) -> Result<LlmResponse, AgentError> {
                self.invoke(messages, tools, tool_choice).await
            }
        }

        let llm = FlakyLlm { calls: AtomicUsize::new(0) };
        let tools = ToolRegistry::new();
        let config = RalphConfig {
            max_iterations: 10,
            completion_conditions: vec![CompletionCondition::IdleThreshold(2)],
            ..RalphConfig::default()
        };
        let outcome = run_ralph("task", &llm, &tools, &config, None).await.unwrap();
        // iteration 0 progresses (TODO), iteration 1 is idle (resets nothing since
        // threshold is 2), iteration 2 progresses again resetting the counter, so
        // idle never reaches 2 consecutive and the run exhausts max_iterations.
        assert_eq!(outcome.reason, CompletionReason::MaxIterations);
        assert_eq!(outcome.iterations_run, 10);
    }

    #[tokio::test]
    async fn promise_tag_condition_stops_when_tag_appears() {
        struct TaggedLlm {
            calls: AtomicUsize,
        }
        #[async_trait]
        impl LlmClient for TaggedLlm {
            async fn invoke(
                &self,
                _messages: &[Msg],
                _tools: &[ToolSpec],
                _tool_choice: ToolChoiceMode,
            ) -> Result<LlmResponse, AgentError> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                let content = if n < 2 { "TODO: still working".to_string() } else { "<promise>DONE</promise>".to_string() };
                Ok(LlmResponse { content, tool_calls: vec![], usage: None })
            }
            async fn invoke_stream(
                &self,
                messages: &[Msg],
                tools: &[ToolSpec],
                tool_choice: ToolChoiceMode,
                _chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
            ) -> Result<LlmResponse, AgentError> {
                self.invoke(messages, tools, tool_choice).await
            }
        }

        let llm = TaggedLlm { calls: AtomicUsize::new(0) };
        let tools = ToolRegistry::new();
        let config = RalphConfig {
            max_iterations: 10,
            completion_conditions: vec![CompletionCondition::PromiseTag("<promise>DONE</promise>".into())],
            ..RalphConfig::default()
        };
        let outcome = run_ralph("task", &llm, &tools, &config, None).await.unwrap();
        assert_eq!(outcome.iterations_run, 3);
        assert_eq!(outcome.reason, CompletionReason::Promise);
    }

    #[tokio::test]
    async fn max_iterations_runs_exactly_the_configured_count() {
        let llm = CountingLlm { calls: AtomicUsize::new(0) };
        let tools = ToolRegistry::new();
        let config = RalphConfig {
            max_iterations: 4,
            completion_conditions: vec![CompletionCondition::MaxIterations],
            ..RalphConfig::default()
        };
        let outcome = run_ralph("task", &llm, &tools, &config, None).await.unwrap();
        assert_eq!(outcome.iterations_run, 4);
        assert_eq!(outcome.reason, CompletionReason::MaxIterations);
        assert_eq!(outcome.memory.progress_log.len(), 4);
    }

    #[test]
    fn recent_strategy_keeps_only_the_last_n_entries() {
        let mut memory = RalphWorkingMemory::default();
        memory.progress_log = vec!["first".into(), "second".into(), "third".into()];
        let recent: Vec<_> = memory.progress_log.iter().rev().take(2).rev().cloned().collect();
        assert_eq!(recent, vec!["second".to_string(), "third".to_string()]);
    }

    #[test]
    fn record_iteration_tracks_file_writes_and_todos() {
        let mut memory = RalphWorkingMemory::default();
        let messages = vec![
            Msg::user("write the readme"),
            Msg::assistant_with_tool_calls(
                "",
                vec![crate::message::ToolCall {
                    id: "c1".into(),
                    name: "write_file".into(),
                    arguments: r#"{"path": "README.md"}"#.into(),
                }],
            ),
            Msg::tool("c1", "wrote 120 bytes"),
            Msg::assistant("TODO: add a usage example"),
        ];
        let progressed = memory.record_iteration(&messages);
        assert!(progressed);
        assert_eq!(memory.files_modified, vec!["README.md".to_string()]);
        assert_eq!(memory.pending_todos, vec!["add a usage example".to_string()]);
    }

    #[test]
    fn reset_ralph_clears_memory_and_idle_counter() {
        let mut runner = RalphRunner::new(RalphConfig::default());
        runner.memory.files_modified.push("a.rs".into());
        runner.memory.progress_log.push("did something".into());
        runner.reset_ralph();
        assert!(runner.memory.files_modified.is_empty());
        assert!(runner.memory.progress_log.is_empty());
    }
}
