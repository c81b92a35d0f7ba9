//! Single-agent step loop (C5): the think -> act -> observe cycle, flattened into
//! a direct loop rather than a three-node graph — one LLM call, then all requested
//! tool calls, then loop.
//!
//! Tool calls within a step run concurrently but are folded back into `messages`
//! in the order the model issued them, not the order they complete in.

use futures::future::join_all;

use crate::error::AgentError;
use crate::event::{AgentEvent, EventBus, EventType};
use crate::llm::{retry_invoke, LlmClient, LlmUsage, RetryConfig, ToolChoiceMode};
use crate::message::Message;
use crate::state::AgentState;
use crate::tool::ToolRegistry;

#[derive(Debug, Clone)]
pub struct StepLoopConfig {
    pub tool_choice: ToolChoiceMode,
    pub retry: RetryConfig,
}

impl Default for StepLoopConfig {
    fn default() -> Self {
        Self {
            tool_choice: ToolChoiceMode::Auto,
            retry: RetryConfig::default(),
        }
    }
}

/// Runs steps until the model stops requesting tools, a tool requires approval and
/// none has been supplied, or `state.max_steps` is reached.
///
/// Mutates `state` in place; always returns `Ok(())` unless the LLM call itself
/// fails after retries are exhausted. Hitting `max_steps` is not an error — the
/// loop simply stops with `state.status` still `Running`.
pub async fn run_step_loop(
    state: &mut AgentState,
    llm: &dyn LlmClient,
    tools: &ToolRegistry,
    config: &StepLoopConfig,
    events: Option<&EventBus>,
) -> Result<(), AgentError> {
    state.mark_running();

    while state.can_continue() {
        if let Some(bus) = events {
            bus.emit(AgentEvent::new(
                EventType::StepStart,
                serde_json::json!({ "step": state.current_step }),
            ))
            .await;
        }

        let specs = tools.specs();
        let messages = state.messages.clone();
        if let Some(bus) = events {
            bus.emit(AgentEvent::new(
                EventType::LlmRequest,
                serde_json::json!({ "step": state.current_step }),
            ))
            .await;
        }
        let response = retry_invoke(&config.retry, || {
            llm.invoke(&messages, &specs, config.tool_choice)
        })
        .await?;

        if let Some(usage) = response.usage {
            state.add_tokens(usage);
            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::TokenSummary,
                    serde_json::json!({ "total_tokens": state.total_tokens() }),
                ))
                .await;
            }
        } else {
            state.add_tokens(LlmUsage::default());
        }

        if let Some(bus) = events {
            bus.emit(AgentEvent::new(
                EventType::LlmResponse,
                serde_json::json!({ "content": response.content }),
            ))
            .await;
        }

        if response.tool_calls.is_empty() {
            state
                .messages
                .push(Message::assistant(response.content.clone()));
            state.mark_completed();
            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::Completion,
                    serde_json::json!({ "content": response.content }),
                ))
                .await;
            }
            break;
        }

        if let Some(first_unapproved) = response
            .tool_calls
            .iter()
            .find(|tc| tools.get(&tc.name).is_some_and(|t| t.requires_approval()))
        {
            state.messages.push(Message::assistant_with_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            state.mark_waiting_input(
                first_unapproved.id.clone(),
                serde_json::json!({
                    "tool_name": first_unapproved.name,
                    "arguments": first_unapproved.arguments,
                }),
            );
            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::UserInputRequired,
                    serde_json::json!({ "tool_call_id": first_unapproved.id }),
                ))
                .await;
            }
            return Ok(());
        }

        state.messages.push(Message::assistant_with_tool_calls(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        let tools_ref = tools;
        let calls = response.tool_calls.clone();
        let futures = calls
            .iter()
            .map(|tc| tools_ref.execute(&tc.id, &tc.name, &tc.arguments));
        let results = join_all(futures).await;

        let needs_input = results.iter().find(|r| r.needs_input.is_some()).cloned();

        for result in &results {
            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::ToolEnd,
                    serde_json::json!({ "name": result.name, "success": result.success }),
                ))
                .await;
            }
            // A needs-input result pauses the loop without ever becoming a tool
            // message: the next run call must resume at this exact call with the
            // missing input, not see it as an already-failed turn.
            if result.needs_input.is_some() {
                continue;
            }
            state
                .messages
                .push(Message::tool(result.call_id.clone(), result.content.clone()));
        }

        if let Some(needs_input) = needs_input {
            state.mark_waiting_input(
                needs_input.call_id.clone(),
                serde_json::json!({
                    "tool_name": needs_input.name,
                    "schema": needs_input.needs_input,
                }),
            );
            if let Some(bus) = events {
                bus.emit(AgentEvent::new(
                    EventType::UserInputRequired,
                    serde_json::json!({ "tool_call_id": needs_input.call_id }),
                ))
                .await;
            }
            return Ok(());
        }

        if let Some(bus) = events {
            bus.emit(AgentEvent::new(
                EventType::StepEnd,
                serde_json::json!({ "step": state.current_step }),
            ))
            .await;
        }

        state.increment_step();
    }

    Ok(())
}

/// Resumes a run parked in `WaitingInput` by retrying the exact tool call that
/// asked for input, now supplying `answer` as its arguments, then continues the
/// step loop as if that call had succeeded on the first attempt.
///
/// `state` must be `WaitingInput` with `paused_tool_call_id` and
/// `pending_user_input` set (as left by `run_step_loop` on a `needs_input` or
/// approval pause) — anything else is a caller bug.
pub async fn resume_step_loop(
    state: &mut AgentState,
    llm: &dyn LlmClient,
    tools: &ToolRegistry,
    config: &StepLoopConfig,
    events: Option<&EventBus>,
    answer: serde_json::Value,
) -> Result<(), AgentError> {
    let call_id = state
        .paused_tool_call_id
        .clone()
        .ok_or_else(|| AgentError::ExecutionFailed("no paused tool call to resume".into()))?;
    let tool_name = state
        .pending_user_input
        .as_ref()
        .and_then(|p| p.get("tool_name"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AgentError::ExecutionFailed("no tool name recorded for paused call".into()))?
        .to_string();

    let arguments_json = answer.to_string();
    let result = tools.execute(&call_id, &tool_name, &arguments_json).await;

    if let Some(bus) = events {
        bus.emit(AgentEvent::new(
            EventType::ToolEnd,
            serde_json::json!({ "name": result.name, "success": result.success }),
        ))
        .await;
    }

    if let Some(schema) = result.needs_input.clone() {
        state.mark_waiting_input(
            result.call_id.clone(),
            serde_json::json!({ "tool_name": result.name, "schema": schema }),
        );
        if let Some(bus) = events {
            bus.emit(AgentEvent::new(
                EventType::UserInputRequired,
                serde_json::json!({ "tool_call_id": result.call_id }),
            ))
            .await;
        }
        return Ok(());
    }

    state.resume_from_input(answer);
    state
        .messages
        .push(Message::tool(result.call_id.clone(), result.content.clone()));

    if let Some(bus) = events {
        bus.emit(AgentEvent::new(
            EventType::StepEnd,
            serde_json::json!({ "step": state.current_step }),
        ))
        .await;
    }
    state.increment_step();

    run_step_loop(state, llm, tools, config, events).await
}
