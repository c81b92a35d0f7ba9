//! Team delegation controller (C8): a leader agent that delegates sub-tasks to
//! named members, each running its own step loop.
//!
//! Grounded on `TeamConfig`/`TeamMemberConfig`/`MemberRunResult` from the original
//! implementation's team schemas and the leader/member pattern from its team
//! collaboration example: the leader holds a single delegation tool taking
//! `{member_id, task}`; calling it synchronously runs the named member's step
//! loop and folds its reply back as the tool result. With `delegate_to_all` the
//! leader never runs at all — the task is fanned out to every member directly
//! and replies are concatenated, tagged by member. LLM provider routing is out
//! of scope here, so per-member `model` overrides are resolved through a
//! caller-supplied `ModelRouter` rather than a concrete provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use crate::error::AgentError;
use crate::event::EventBus;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::state::AgentState;
use crate::step_loop::{run_step_loop, StepLoopConfig};
use crate::tool::{Tool, ToolError, ToolRegistry, ToolRegistryBuilder, ToolSpec};

/// Resolves a model name (a per-member override, or `None` for the team default)
/// to a concrete `LlmClient`. Kept abstract since provider routing is out of scope.
pub trait ModelRouter: Send + Sync {
    fn resolve(&self, model: Option<&str>) -> Arc<dyn LlmClient>;
}

/// Routes every request to a single client regardless of any requested model,
/// useful for tests and for teams that never override the default model.
pub struct SingleModelRouter(pub Arc<dyn LlmClient>);

impl ModelRouter for SingleModelRouter {
    fn resolve(&self, _model: Option<&str>) -> Arc<dyn LlmClient> {
        Arc::clone(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct TeamMemberConfig {
    pub name: String,
    pub role: String,
    pub instructions: Option<String>,
    /// Model this member should run on; `None` defers to the team's default.
    pub model: Option<String>,
    pub max_steps: u32,
}

#[derive(Debug, Clone)]
pub struct TeamConfig {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<TeamMemberConfig>,
    pub leader_instructions: Option<String>,
    /// When true, a task is run against every member directly rather than left
    /// to the leader to select which members to delegate to.
    pub delegate_to_all: bool,
    pub max_iterations: u32,
}

#[derive(Debug, Clone)]
pub struct MemberRunResult {
    pub member_name: String,
    pub member_role: String,
    pub task: String,
    pub response: String,
    pub success: bool,
    pub error: Option<String>,
    pub steps: u32,
}

#[derive(Debug, Clone)]
pub struct TeamRunOutcome {
    pub success: bool,
    pub message: String,
    pub member_runs: Vec<MemberRunResult>,
    pub total_steps: u32,
    pub iterations: u32,
}

/// The state the delegation tool needs to run a member without holding a
/// reference back to the owning `Team` — the `Team` owns a `ToolRegistry` that
/// in turn owns the tool, so a tool -> `Team` edge would be a cycle. Per the
/// cyclic-reference note this carries only what a delegated run needs, and the
/// target member is resolved by id at `call` time, not stored up front.
struct TeamHandle {
    router: Arc<dyn ModelRouter>,
    members: HashMap<String, TeamMemberConfig>,
    member_tools: HashMap<String, Arc<ToolRegistry>>,
}

/// The leader's one delegation tool. Its parameter is `{member_id, task}`;
/// calling it runs the named member's step loop to completion on the given
/// task and returns its final reply as the tool result.
struct DelegationTool {
    handle: Arc<TeamHandle>,
}

#[async_trait]
impl Tool for DelegationTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delegate".to_string(),
            description: "Delegates a task to a named team member and returns their reply."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "member_id": { "type": "string" },
                    "task": { "type": "string" },
                },
                "required": ["member_id", "task"],
            }),
            human_input_schema: None,
        }
    }

    async fn call(&self, arguments: Value) -> Result<String, ToolError> {
        let member_id = arguments
            .get("member_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'member_id'".to_string()))?;
        let task = arguments
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'task'".to_string()))?;
        let member = self
            .handle
            .members
            .get(member_id)
            .ok_or_else(|| ToolError::InvalidInput(format!("unknown member_id '{member_id}'")))?;
        let result = run_member(member, &self.handle, task, None).await;
        if result.success {
            Ok(result.response)
        } else {
            Err(ToolError::Failed(
                result.error.unwrap_or_else(|| "member run failed".to_string()),
            ))
        }
    }
}

async fn run_member(
    member: &TeamMemberConfig,
    handle: &TeamHandle,
    task: &str,
    events: Option<&EventBus>,
) -> MemberRunResult {
    let llm = handle.router.resolve(member.model.as_deref());
    let empty_tools = ToolRegistry::new();
    let tools = handle
        .member_tools
        .get(&member.name)
        .map(Arc::as_ref)
        .unwrap_or(&empty_tools);

    let mut state = AgentState::new(member.max_steps);
    if let Some(instructions) = &member.instructions {
        state.messages.push(Message::system(instructions.clone()));
    }
    state.messages.push(Message::user(task.to_string()));

    let outcome = run_step_loop(&mut state, llm.as_ref(), tools, &StepLoopConfig::default(), events).await;

    match outcome {
        Ok(()) if state.is_completed() => {
            let response = state.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            MemberRunResult {
                member_name: member.name.clone(),
                member_role: member.role.clone(),
                task: task.to_string(),
                response,
                success: true,
                error: None,
                steps: state.current_step,
            }
        }
        Ok(()) => MemberRunResult {
            member_name: member.name.clone(),
            member_role: member.role.clone(),
            task: task.to_string(),
            response: String::new(),
            success: false,
            error: Some("member did not complete within its step budget".to_string()),
            steps: state.current_step,
        },
        Err(e) => MemberRunResult {
            member_name: member.name.clone(),
            member_role: member.role.clone(),
            task: task.to_string(),
            response: String::new(),
            success: false,
            error: Some(e.to_string()),
            steps: state.current_step,
        },
    }
}

/// A configured team: a leader model plus named members, each with their own
/// tool subset.
pub struct Team {
    config: TeamConfig,
    handle: Arc<TeamHandle>,
}

impl Team {
    /// `member_tools` maps member name to the tool registry that member's step
    /// loop runs with; a member absent from the map runs with no tools.
    pub fn new(
        config: TeamConfig,
        router: Arc<dyn ModelRouter>,
        member_tools: HashMap<String, Arc<ToolRegistry>>,
    ) -> Self {
        let members = config
            .members
            .iter()
            .map(|m| (m.name.clone(), m.clone()))
            .collect();
        Self {
            config,
            handle: Arc::new(TeamHandle { router, members, member_tools }),
        }
    }

    /// Runs `task` against every member directly, concurrently, with no leader
    /// in the loop. Used when `config.delegate_to_all` is set.
    pub async fn run_delegate_to_all(&self, task: &str, events: Option<&EventBus>) -> TeamRunOutcome {
        let futures = self
            .config
            .members
            .iter()
            .map(|member| run_member(member, &self.handle, task, events));
        let member_runs: Vec<MemberRunResult> = join_all(futures).await;

        let total_steps = member_runs.iter().map(|r| r.steps).sum();
        let success = member_runs.iter().all(|r| r.success);
        let message = member_runs
            .iter()
            .map(|r| format!("[{}] {}", r.member_name, r.response))
            .collect::<Vec<_>>()
            .join("\n\n");

        TeamRunOutcome {
            success,
            message,
            member_runs,
            total_steps,
            iterations: 1,
        }
    }

    /// Runs a leader step loop with a single `delegate` tool taking
    /// `{member_id, task}`; the leader decides which members to call and
    /// synthesizes their replies.
    pub async fn run_with_leader(
        &self,
        task: &str,
        leader_llm: &dyn LlmClient,
        events: Option<&EventBus>,
    ) -> Result<TeamRunOutcome, AgentError> {
        if self.config.delegate_to_all {
            return Ok(self.run_delegate_to_all(task, events).await);
        }

        let builder: ToolRegistryBuilder = ToolRegistry::builder()
            .with_tool(Arc::new(DelegationTool { handle: Arc::clone(&self.handle) }));
        let leader_tools = builder
            .build()
            .map_err(|e| AgentError::RunFailed(e.to_string()))?;

        let mut leader_state = AgentState::new(self.config.max_iterations);
        if let Some(instructions) = &self.config.leader_instructions {
            leader_state.messages.push(Message::system(instructions.clone()));
        }
        leader_state.messages.push(Message::user(task.to_string()));

        run_step_loop(
            &mut leader_state,
            leader_llm,
            &leader_tools,
            &StepLoopConfig::default(),
            events,
        )
        .await?;

        let message = leader_state
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(TeamRunOutcome {
            success: leader_state.is_completed(),
            message,
            member_runs: Vec::new(),
            total_steps: leader_state.current_step,
            iterations: leader_state.current_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, LlmUsage, MessageChunk, ToolChoiceMode};
    use crate::message::ToolCall;
    use crate::tool::ToolSpec as Spec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoingLlm {
        reply: &'static str,
    }

    #[async_trait]
    impl LlmClient for EchoingLlm {
        async fn invoke(
            &self,
            _messages: &[Message],
            _tools: &[Spec],
            _tool_choice: ToolChoiceMode,
        ) -> Result<LlmResponse, AgentError> {
            Ok(LlmResponse {
                content: self.reply.to_string(),
                tool_calls: vec![],
                usage: Some(LlmUsage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 }),
            })
        }

        async fn invoke_stream(
            &self,
            messages: &[Message],
            tools: &[Spec],
            tool_choice: ToolChoiceMode,
            _chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
        ) -> Result<LlmResponse, AgentError> {
            self.invoke(messages, tools, tool_choice).await
        }
    }

    fn member(name: &str, role: &str) -> TeamMemberConfig {
        TeamMemberConfig {
            name: name.to_string(),
            role: role.to_string(),
            instructions: None,
            model: None,
            max_steps: 5,
        }
    }

    #[tokio::test]
    async fn delegate_to_all_runs_every_member_and_merges_replies() {
        let config = TeamConfig {
            name: "research".into(),
            description: None,
            members: vec![member("researcher", "finds facts"), member("writer", "writes prose")],
            leader_instructions: None,
            delegate_to_all: true,
            max_iterations: 5,
        };
        let router: Arc<dyn ModelRouter> =
            Arc::new(SingleModelRouter(Arc::new(EchoingLlm { reply: "done" })));
        let team = Team::new(config, router, HashMap::new());

        let outcome = team.run_delegate_to_all("summarize asyncio", None).await;

        assert!(outcome.success);
        assert_eq!(outcome.member_runs.len(), 2);
        assert!(outcome.message.contains("researcher"));
        assert!(outcome.message.contains("writer"));
    }

    #[tokio::test]
    async fn leader_delegates_to_a_member_via_tool_call() {
        struct DelegatingLeader {
            calls: AtomicUsize,
        }
        #[async_trait]
        impl LlmClient for DelegatingLeader {
            async fn invoke(
                &self,
                _messages: &[Message],
                _tools: &[Spec],
                _tool_choice: ToolChoiceMode,
            ) -> Result<LlmResponse, AgentError> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok(LlmResponse {
                        content: "delegating".into(),
                        tool_calls: vec![ToolCall {
                            id: "c1".into(),
                            name: "delegate".into(),
                            arguments: r#"{"member_id": "researcher", "task": "find facts"}"#.into(),
                        }],
                        usage: None,
                    })
                } else {
                    Ok(LlmResponse { content: "synthesized".into(), tool_calls: vec![], usage: None })
                }
            }
            async fn invoke_stream(
                &self,
                messages: &[Message],
                tools: &[Spec],
                tool_choice: ToolChoiceMode,
                _chunk_tx: Option<tokio::sync::mpsc::Sender<MessageChunk>>,
            ) -> Result<LlmResponse, AgentError> {
                self.invoke(messages, tools, tool_choice).await
            }
        }

        let config = TeamConfig {
            name: "research".into(),
            description: None,
            members: vec![member("researcher", "finds facts")],
            leader_instructions: Some("delegate then summarize".into()),
            delegate_to_all: false,
            max_iterations: 5,
        };
        let router: Arc<dyn ModelRouter> =
            Arc::new(SingleModelRouter(Arc::new(EchoingLlm { reply: "facts found" })));
        let team = Team::new(config, router, HashMap::new());
        let leader = DelegatingLeader { calls: AtomicUsize::new(0) };

        let outcome = team.run_with_leader("research asyncio", &leader, None).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "synthesized");
    }

    #[tokio::test]
    async fn delegate_tool_rejects_an_unknown_member_id() {
        let config = TeamConfig {
            name: "research".into(),
            description: None,
            members: vec![member("researcher", "finds facts")],
            leader_instructions: None,
            delegate_to_all: false,
            max_iterations: 5,
        };
        let router: Arc<dyn ModelRouter> =
            Arc::new(SingleModelRouter(Arc::new(EchoingLlm { reply: "facts found" })));
        let team = Team::new(config, router, HashMap::new());
        let tool = DelegationTool { handle: Arc::clone(&team.handle) };

        let err = tool
            .call(serde_json::json!({ "member_id": "ghost", "task": "anything" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
